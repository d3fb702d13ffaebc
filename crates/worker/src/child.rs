//! Child-process lifecycle: spawn the Scan Runner, hand it the sub-job
//! over stdin, and race its response against the per-sub-job deadline.

use std::process::Stdio;
use std::time::Duration;

use pipeline_core::{EngineResponse, SubJob};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

/// What the worker observed from one child invocation.
pub enum ChildOutcome {
    /// The child reported a response before the deadline.
    Response(EngineResponse),
    /// No response arrived within `maxRunTime`; the child has been killed.
    TimedOut,
    /// The child process could not be spawned at all.
    SpawnFailed(std::io::Error),
    /// The child exited (or its pipe closed) before sending a response.
    Crashed { exit_code: Option<i32> },
    /// The worker is shutting down; the child was killed before responding.
    ShuttingDown,
}

/// Spawns the Scan Runner, writes `sub_job` as one JSON line to its stdin,
/// then awaits the first of: a response line on stdout, the child's own
/// exit, `deadline` elapsing, or `shutdown` firing. On timeout or shutdown
/// the child is sent `SIGTERM` followed by a best-effort kill.
pub async fn run_sub_job(
    scan_runner_path: &std::path::Path,
    sub_job: &SubJob,
    deadline: Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> ChildOutcome {
    let mut child = match Command::new(scan_runner_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(c) => c,
        Err(e) => return ChildOutcome::SpawnFailed(e),
    };

    if let Err(e) = write_request(&mut child, sub_job).await {
        tracing::warn!(error = %e, "failed to write sub-job to child stdin");
        let exit_code = wait_best_effort(&mut child).await;
        return ChildOutcome::Crashed { exit_code };
    }

    let mut stdout = BufReader::new(child.stdout.take().expect("stdout was piped"));
    let mut line = String::new();

    tokio::select! {
        read_result = stdout.read_line(&mut line) => {
            match read_result {
                Ok(0) => {
                    let exit_code = wait_best_effort(&mut child).await;
                    ChildOutcome::Crashed { exit_code }
                }
                Ok(_) => match serde_json::from_str::<EngineResponse>(line.trim_end()) {
                    Ok(response) => {
                        let _ = wait_best_effort(&mut child).await;
                        ChildOutcome::Response(response)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "child produced an undecodable response");
                        let exit_code = wait_best_effort(&mut child).await;
                        ChildOutcome::Crashed { exit_code }
                    }
                },
            }
        }
        _ = tokio::time::sleep(deadline) => {
            terminate(&mut child).await;
            ChildOutcome::TimedOut
        }
        _ = wait_for_shutdown(&mut shutdown), if !*shutdown.borrow() => {
            terminate(&mut child).await;
            ChildOutcome::ShuttingDown
        }
    }
}

async fn wait_for_shutdown(rx: &mut tokio::sync::watch::Receiver<bool>) {
    let _ = rx.changed().await;
}

async fn write_request(child: &mut Child, sub_job: &SubJob) -> std::io::Result<()> {
    let mut stdin = child.stdin.take().expect("stdin was piped");
    let mut line = serde_json::to_vec(sub_job).expect("SubJob serializes");
    line.push(b'\n');
    stdin.write_all(&line).await?;
    stdin.flush().await?;
    // Drop stdin so the child sees EOF after its one request.
    drop(stdin);
    Ok(())
}

async fn wait_best_effort(child: &mut Child) -> Option<i32> {
    match tokio::time::timeout(Duration::from_secs(5), child.wait()).await {
        Ok(Ok(status)) => status.code(),
        _ => None,
    }
}

/// `SIGTERM`, then a best-effort `SIGKILL` if the child hasn't exited
/// shortly after.
async fn terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
    if tokio::time::timeout(Duration::from_millis(500), child.wait())
        .await
        .is_err()
    {
        let _ = child.start_kill();
    }
}
