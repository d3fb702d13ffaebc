//! Sync Service merge algorithm: applying a `ResultMessage`'s effects onto
//! a durable `Job` record. Pure and idempotent; the caller is responsible
//! for holding the per-job lock around the call.

use crate::model::{Job, JobStatus, ResultMessage};

/// Applies `msg` onto `job` in place, following the six-step merge
/// algorithm. Safe to call twice with the same message: the second call is
/// a no-op given the invariants already hold.
pub fn apply_result(job: &mut Job, msg: &ResultMessage) {
    // Step 1: terminal error is absorbing.
    if job.status == JobStatus::Error {
        return;
    }

    match msg {
        ResultMessage::Started {
            started,
            engine_version,
            ..
        } => {
            // Step 2: first writer wins for `started`/`engineVersion`; the
            // status still advances pending -> started even on a repeat.
            if job.status == JobStatus::Pending {
                job.started = Some(started.clone());
                job.engine_version = engine_version.clone();
                job.status = JobStatus::Started;
            }
        }
        terminal => {
            // Step 3: copy any still-pending hint's status/messages.
            for incoming in terminal.hints() {
                if let Some(existing) = job.hints.iter_mut().find(|h| h.name == incoming.name) {
                    if existing.status == crate::model::HintStatus::Pending {
                        existing.status = incoming.status;
                        existing.messages = incoming.messages.clone();
                    }
                }
            }

            match terminal {
                ResultMessage::Errored { finished, error, .. } => {
                    // Step 4.
                    job.status = JobStatus::Error;
                    job.finished = Some(finished.clone());
                    job.error = Some(error.clone());
                }
                ResultMessage::Finished { finished, .. } => {
                    // Step 5.
                    if job.all_hints_non_pending() {
                        job.status = JobStatus::Finished;
                        job.finished = Some(finished.clone());
                    }
                }
                ResultMessage::Started { .. } => unreachable!("handled above"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConfigBundle, ErrorPayload, HintResult, HintStatus, PartInfo, ResultCommon};

    fn base_job() -> Job {
        let mut bundle = ConfigBundle::new();
        bundle.insert(
            "content-type".to_string(),
            crate::model::HintConfigEntry::Severity("error".into()),
        );
        Job::new_pending("https://example.com", vec![bundle], 30)
    }

    fn started_for(job: &Job) -> ResultMessage {
        ResultMessage::Started {
            common: ResultCommon {
                id: job.id.clone(),
                part_info: PartInfo { part: 0, total_parts: 1 },
                hints: job.hints.clone(),
            },
            started: "2024-01-01T00:00:00Z".to_string(),
            engine_version: Some("1.2.3".to_string()),
        }
    }

    #[test]
    fn two_started_messages_only_first_sets_fields() {
        let mut job = base_job();
        let first = started_for(&job);
        apply_result(&mut job, &first);
        assert_eq!(job.started.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(job.engine_version.as_deref(), Some("1.2.3"));
        assert_eq!(job.status, JobStatus::Started);

        let mut second = started_for(&job);
        if let ResultMessage::Started { started, engine_version, .. } = &mut second {
            *started = "2024-01-01T00:05:00Z".to_string();
            *engine_version = Some("9.9.9".to_string());
        }
        apply_result(&mut job, &second);
        assert_eq!(job.started.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(job.engine_version.as_deref(), Some("1.2.3"));
        assert_eq!(job.status, JobStatus::Started);
    }

    #[test]
    fn error_terminal_after_finished_wins() {
        let mut job = base_job();
        let finished = ResultMessage::Finished {
            common: ResultCommon {
                id: job.id.clone(),
                part_info: PartInfo { part: 0, total_parts: 1 },
                hints: vec![HintResult {
                    name: "content-type".into(),
                    status: HintStatus::Pass,
                    messages: vec![],
                }],
            },
            finished: "2024-01-01T00:01:00Z".to_string(),
            error: None,
        };
        apply_result(&mut job, &finished);
        assert_eq!(job.status, JobStatus::Finished);

        job.status = JobStatus::Started; // re-open for the scenario: error arrives "after"
        job.hints[0].status = HintStatus::Pending;
        let errored = ResultMessage::Errored {
            common: ResultCommon {
                id: job.id.clone(),
                part_info: PartInfo { part: 0, total_parts: 1 },
                hints: vec![HintResult {
                    name: "content-type".into(),
                    status: HintStatus::Error,
                    messages: vec![],
                }],
            },
            finished: "2024-01-01T00:02:00Z".to_string(),
            error: ErrorPayload::message("boom"),
        };
        apply_result(&mut job, &errored);
        assert_eq!(job.status, JobStatus::Error);
    }

    #[test]
    fn duplicate_terminal_for_same_hint_is_a_no_op() {
        let mut job = base_job();
        let finished = ResultMessage::Finished {
            common: ResultCommon {
                id: job.id.clone(),
                part_info: PartInfo { part: 0, total_parts: 1 },
                hints: vec![HintResult {
                    name: "content-type".into(),
                    status: HintStatus::Warning,
                    messages: vec![],
                }],
            },
            finished: "2024-01-01T00:01:00Z".to_string(),
            error: None,
        };
        apply_result(&mut job, &finished);
        let after_first = job.clone();

        apply_result(&mut job, &finished);
        assert_eq!(job, after_first);
    }

    #[test]
    fn finished_only_closes_job_once_all_hints_decided() {
        let mut bundle = ConfigBundle::new();
        bundle.insert(
            "axe".to_string(),
            crate::model::HintConfigEntry::Severity("warning".into()),
        );
        bundle.insert(
            "content-type".to_string(),
            crate::model::HintConfigEntry::Severity("error".into()),
        );
        let mut job = Job::new_pending("https://example.com", vec![bundle], 30);

        let partial = ResultMessage::Finished {
            common: ResultCommon {
                id: job.id.clone(),
                part_info: PartInfo { part: 0, total_parts: 2 },
                hints: vec![HintResult {
                    name: "axe".into(),
                    status: HintStatus::Pass,
                    messages: vec![],
                }],
            },
            finished: "2024-01-01T00:01:00Z".to_string(),
            error: None,
        };
        apply_result(&mut job, &partial);
        assert_eq!(job.status, JobStatus::Pending);

        let rest = ResultMessage::Finished {
            common: ResultCommon {
                id: job.id.clone(),
                part_info: PartInfo { part: 1, total_parts: 2 },
                hints: vec![HintResult {
                    name: "content-type".into(),
                    status: HintStatus::Pass,
                    messages: vec![],
                }],
            },
            finished: "2024-01-01T00:02:00Z".to_string(),
            error: None,
        };
        apply_result(&mut job, &rest);
        assert_eq!(job.status, JobStatus::Finished);
    }
}
