//! sync — merges results-queue messages into the durable job store under a
//! per-job lock. Logs go to stderr.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use pipeline_datastore::{resolve_root, FileJobStore, FileLockManager};
use pipeline_queue::{NatsQueue, NatsQueueConfig};
use tracing_subscriber::EnvFilter;
use ulid::Ulid;

#[derive(Debug, Parser)]
#[command(name = "sync")]
#[command(about = "Merges scan results into the durable job store", long_about = None)]
struct Cli {
    /// NATS server URL.
    #[arg(long, env = "PIPELINE_NATS_URL", default_value = "nats://127.0.0.1:4222")]
    nats_url: String,

    /// Subject/stream/consumer sync pulls result messages from.
    #[arg(long, env = "PIPELINE_RESULTS_SUBJECT", default_value = "pipeline.results")]
    results_subject: String,

    /// Directory holding the job store.
    #[arg(long, env = "PIPELINE_ROOT")]
    jobs_root: Option<String>,

    /// Lease TTL, in seconds, for the per-job merge lock.
    #[arg(long, env = "PIPELINE_LOCK_TTL", default_value_t = sync::config::DEFAULT_LOCK_TTL_SECS)]
    lock_ttl_secs: u64,

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
        tracing::error!(error = %e, "sync exited with a fatal error");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let root = resolve_root(cli.jobs_root.as_deref());
    let store = Arc::new(FileJobStore::new(root.clone()));
    let locks = Arc::new(FileLockManager::new(
        root,
        Duration::from_secs(cli.lock_ttl_secs),
        format!("sync-{}", Ulid::new()),
    ));

    let results = NatsQueue::connect(NatsQueueConfig {
        url: cli.nats_url,
        subject: cli.results_subject,
        stream_name: "PIPELINE_RESULTS".to_string(),
        durable_name: "sync-results".to_string(),
    })
    .await
    .context("failed to bind results queue")?;

    let listen = tokio::spawn(sync::run::run(Arc::new(results), store, locks));

    tokio::select! {
        res = listen => {
            res.context("sync task panicked")??;
            Ok(())
        }
        _ = wait_for_signal() => {
            tracing::info!("received shutdown signal, exiting");
            Ok(())
        }
    }
}

async fn wait_for_signal() {
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
    {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
            unreachable!()
        }
    };
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
}
