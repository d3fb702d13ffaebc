//! worker — pulls sub-jobs off the jobs queue, runs them through the Scan
//! Runner child process, and emits progress/result messages back onto the
//! results queue. Logs go to stderr; nothing is printed to stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pipeline_queue::{NatsQueue, NatsQueueConfig};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use worker::config::WorkerConfig;

#[derive(Debug, Parser)]
#[command(name = "worker")]
#[command(about = "Runs queued sub-jobs through the scan runner", long_about = None)]
struct Cli {
    /// NATS server URL.
    #[arg(long, env = "PIPELINE_NATS_URL", default_value = "nats://127.0.0.1:4222")]
    nats_url: String,

    /// Subject/stream/consumer the worker pulls sub-jobs from.
    #[arg(long, env = "PIPELINE_JOBS_SUBJECT", default_value = "pipeline.jobs")]
    jobs_subject: String,

    /// Subject/stream the worker publishes result messages to.
    #[arg(long, env = "PIPELINE_RESULTS_SUBJECT", default_value = "pipeline.results")]
    results_subject: String,

    /// Path to the scan-runner binary.
    #[arg(long, env = "PIPELINE_SCAN_RUNNER_PATH", default_value = "scan-runner")]
    scan_runner_path: PathBuf,

    /// Maximum number of sub-jobs this process runs concurrently.
    #[arg(long, env = "PIPELINE_MAX_CONCURRENCY", default_value_t = 1)]
    max_concurrency: usize,

    /// Default per-sub-job deadline in seconds, used when a sub-job carries
    /// no maxRunTime of its own.
    #[arg(long, env = "PIPELINE_DEFAULT_RUN_TIME", default_value_t = worker::config::DEFAULT_RUN_TIME_SECS)]
    default_run_time: u64,

    /// Hard cap, in bytes, on one results-queue message before the worker
    /// collapses hint detail to fit.
    #[arg(long, env = "PIPELINE_MAX_MESSAGE_SIZE", default_value_t = worker::config::DEFAULT_MAX_MESSAGE_SIZE)]
    max_message_size: usize,

    /// Increase log verbosity (-v, -vv); logs go to stderr.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    let result = runtime.block_on(run(cli));
    if let Err(e) = result {
        tracing::error!(error = %e, "worker exited with a fatal error");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let jobs = NatsQueue::connect(NatsQueueConfig {
        url: cli.nats_url.clone(),
        subject: cli.jobs_subject.clone(),
        stream_name: "PIPELINE_JOBS".to_string(),
        durable_name: "worker-jobs".to_string(),
    })
    .await
    .context("failed to bind jobs queue")?;

    let results = NatsQueue::connect(NatsQueueConfig {
        url: cli.nats_url,
        subject: cli.results_subject,
        stream_name: "PIPELINE_RESULTS".to_string(),
        durable_name: "worker-results".to_string(),
    })
    .await
    .context("failed to bind results queue")?;

    let config = WorkerConfig {
        scan_runner_path: cli.scan_runner_path,
        max_concurrency: cli.max_concurrency.max(1),
        default_run_time: cli.default_run_time,
        max_message_size: cli.max_message_size,
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(wait_for_signals(shutdown_tx));

    worker::run::run(Arc::new(jobs), Arc::new(results), config, shutdown_rx).await
}

/// Flips `shutdown_tx` to `true` on the first `SIGTERM` or `SIGINT`, letting
/// in-flight sub-jobs finish or be killed rather than abandoned mid-run.
async fn wait_for_signals(shutdown_tx: watch::Sender<bool>) {
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
    {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "failed to install SIGTERM handler");
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("received SIGTERM, draining in-flight sub-jobs");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received SIGINT, draining in-flight sub-jobs");
        }
    }
    let _ = shutdown_tx.send(true);
}
