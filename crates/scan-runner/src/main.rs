//! scan-runner — single-shot child process.
//!
//! Reads one sub-job as a JSON line on stdin, runs the engine once, and
//! writes one `EngineResponse` JSON line to stdout before exiting. Never
//! keeps state across jobs; a fresh process is spawned per sub-job by the
//! worker.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use pipeline_core::{EngineResponse, ErrorPayload, SubJob};
use scan_runner::{RuleEngine, ScanEngine};
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    install_signal_handlers();

    match run() {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            tracing::error!(error = %e, "scan-runner failed before producing a response");
            let response = EngineResponse::Err {
                error: ErrorPayload {
                    message: format!("{e:#}"),
                    stack: None,
                },
            };
            write_response(&response);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<()> {
    let sub_job = read_sub_job()?;
    tracing::info!(id = %sub_job.id, url = %sub_job.url, "scanning");

    let engine = RuleEngine::new();
    let response = match engine.scan(&sub_job.url, &sub_job.config) {
        Ok(messages) => EngineResponse::Ok { messages },
        Err(error) => EngineResponse::Err { error },
    };
    write_response(&response);
    Ok(())
}

fn read_sub_job() -> Result<SubJob> {
    let stdin = std::io::stdin();
    let mut line = String::new();
    stdin
        .lock()
        .read_line(&mut line)
        .context("reading sub-job from stdin")?;
    serde_json::from_str(line.trim_end()).context("parsing sub-job JSON")
}

fn write_response(response: &EngineResponse) {
    let Ok(line) = serde_json::to_string(response) else {
        tracing::error!("failed to serialize engine response");
        return;
    };
    let mut stdout = std::io::stdout();
    let _ = writeln!(stdout, "{line}");
    let _ = stdout.flush();
}

/// On SIGTERM/SIGINT: the engine here holds no external resources to close,
/// so closing cleanly is just exiting without emitting a response — the
/// worker treats a response-less exit the same as any other child failure.
fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGTERM, handle_signal as libc::sighandler_t);
        libc::signal(libc::SIGINT, handle_signal as libc::sighandler_t);
    }
}

extern "C" fn handle_signal(_signum: libc::c_int) {
    std::process::exit(1);
}
