//! Processing a single sub-job end to end: emit `started`, run the child
//! under a deadline, resolve hint statuses, chunk, and emit the terminal
//! ResultMessage(s).

use std::time::Duration;

use pipeline_core::{
    chunking, hints, model::HintMessage, ErrorPayload, HintStatus, ResultCommon, ResultMessage,
    SubJob,
};
use pipeline_queue::{send_with_retry, Queue, RetryPolicy, SendOutcome};

use crate::child::{run_sub_job, ChildOutcome};
use crate::config::WorkerConfig;

/// Runs `sub_job` to completion, emitting `started` and then one or more
/// terminal `ResultMessage`s onto `results`. `shutdown` fires once when the
/// worker receives `SIGTERM`/`SIGINT`; an in-flight sub-job is then killed
/// and reported as failed rather than left to its full deadline.
pub async fn process_sub_job<Q>(
    sub_job: SubJob,
    config: &WorkerConfig,
    results: &Q,
    shutdown: tokio::sync::watch::Receiver<bool>,
) where
    Q: Queue<ResultMessage>,
{
    let retry = RetryPolicy::default();
    let started = pipeline_core::time::now_rfc3339();

    let started_msg = ResultMessage::Started {
        common: ResultCommon {
            id: sub_job.id.clone(),
            part_info: sub_job.part_info,
            hints: sub_job.hints.clone(),
        },
        started,
        engine_version: None,
    };
    emit(results, &started_msg, &retry, config.max_message_size).await;

    let deadline = Duration::from_secs(sub_job.max_run_time.unwrap_or(config.default_run_time));
    let outcome = run_sub_job(&config.scan_runner_path, &sub_job, deadline, shutdown).await;
    let terminal = build_terminal(&sub_job, outcome);

    for partition in chunking::package_terminal(terminal, config.max_message_size) {
        emit(results, &partition, &retry, config.max_message_size).await;
    }
}

/// Builds the terminal ResultMessage for one child outcome: a clean engine
/// response, an engine error, or the deadline firing.
fn build_terminal(sub_job: &SubJob, outcome: ChildOutcome) -> ResultMessage {
    let finished = pipeline_core::time::now_rfc3339();
    match outcome {
        ChildOutcome::Response(pipeline_core::EngineResponse::Ok { messages }) => {
            let resolved = hints::resolve_ok(&sub_job.hints, &sub_job.config, &messages);
            ResultMessage::Finished {
                common: common(sub_job, resolved),
                finished,
                error: None,
            }
        }
        ChildOutcome::Response(pipeline_core::EngineResponse::Err { error }) => {
            let resolved = hints::resolve_err(&sub_job.hints, &sub_job.config, &error);
            ResultMessage::Errored {
                common: common(sub_job, resolved),
                finished,
                error,
            }
        }
        ChildOutcome::TimedOut => {
            let resolved = hints::resolve_timeout(&sub_job.hints);
            ResultMessage::Finished {
                common: common(sub_job, resolved),
                finished,
                error: Some(ErrorPayload::timeout()),
            }
        }
        ChildOutcome::SpawnFailed(e) => {
            let error = ErrorPayload {
                message: format!("failed to spawn scan runner: {e}"),
                stack: None,
            };
            let resolved = hints::resolve_err(&sub_job.hints, &sub_job.config, &error);
            ResultMessage::Errored {
                common: common(sub_job, resolved),
                finished,
                error,
            }
        }
        ChildOutcome::Crashed { exit_code } => {
            let error = ErrorPayload {
                message: match exit_code {
                    Some(code) => format!("scan runner exited with code {code} before responding"),
                    None => "scan runner exited before responding".to_string(),
                },
                stack: None,
            };
            let resolved = hints::resolve_err(&sub_job.hints, &sub_job.config, &error);
            ResultMessage::Errored {
                common: common(sub_job, resolved),
                finished,
                error,
            }
        }
        ChildOutcome::ShuttingDown => {
            let error = ErrorPayload::message("worker shutting down");
            let resolved = hints::resolve_err(&sub_job.hints, &sub_job.config, &error);
            ResultMessage::Errored {
                common: common(sub_job, resolved),
                finished,
                error,
            }
        }
    }
}

fn common(sub_job: &SubJob, hints: Vec<pipeline_core::HintResult>) -> ResultCommon {
    ResultCommon {
        id: sub_job.id.clone(),
        part_info: sub_job.part_info,
        hints,
    }
}

/// Emits one (already-sized) ResultMessage, retrying transient failures and
/// handling a reactive oversize rejection with one collapse-and-resend pass.
async fn emit<Q>(results: &Q, msg: &ResultMessage, retry: &RetryPolicy, max_size: usize)
where
    Q: Queue<ResultMessage>,
{
    match send_with_retry(results, msg, retry).await {
        SendOutcome::Ok => {}
        SendOutcome::Oversize => {
            let collapsed = collapse_hints_to_fit(msg.clone(), max_size);
            match send_with_retry(results, &collapsed, retry).await {
                SendOutcome::Ok => {}
                other => log_abandoned(msg, &other),
            }
        }
        other => log_abandoned(msg, &other),
    }
}

/// Collapses the largest non-`off` hint's `messages` to the synthetic
/// "too many errors" entry, repeating against the next largest until the
/// message fits under `max_size` or every hint is collapsed. Proactive
/// per-hint and whole-message partitioning already ran in
/// `chunking::package_terminal`; this only fires when the bus still rejects
/// the result as oversize, so it leaves untouched hints' real messages
/// intact rather than collapsing the whole set on the first rejection.
fn collapse_hints_to_fit(mut msg: ResultMessage, max_size: usize) -> ResultMessage {
    loop {
        let largest = msg
            .common_mut()
            .hints
            .iter_mut()
            .filter(|h| h.status != HintStatus::Off && !is_collapsed(h))
            .max_by_key(|h| serde_json::to_vec(&h.messages).map(|v| v.len()).unwrap_or(0));
        match largest {
            Some(h) => h.messages = vec![HintMessage::too_many_errors(&h.name)],
            None => return msg,
        }
        if serde_json::to_vec(&msg).map(|v| v.len()).unwrap_or(usize::MAX) <= max_size {
            return msg;
        }
    }
}

fn is_collapsed(h: &pipeline_core::HintResult) -> bool {
    h.messages.len() == 1 && h.messages[0] == HintMessage::too_many_errors(&h.name)
}

fn log_abandoned(msg: &ResultMessage, outcome: &SendOutcome) {
    tracing::error!(
        id = %msg.id(),
        part = msg.part_info().part,
        status = msg.status_str(),
        outcome = ?outcome,
        "abandoning sub-job emission after exhausting retries"
    );
}
