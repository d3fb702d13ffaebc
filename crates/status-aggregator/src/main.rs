//! status-aggregator — periodic counter of queued/started/finished jobs
//! per 15-minute bucket. Wakes on a configurable interval, backfills any
//! completed buckets the last run missed, and always refreshes the
//! current (open) bucket's queue-depth snapshot last.

mod compute;
mod model;
mod store;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use pipeline_datastore::{resolve_root, FileJobStore, JobStore};
use pipeline_queue::{NatsQueue, NatsQueueConfig, Queue};
use tracing_subscriber::EnvFilter;

use compute::compute_bucket;
use model::{bucket_start, BUCKET_SECS};
use store::FileAggregateStore;

/// How often the loop wakes to check for newly-completed buckets. The
/// bucket width itself (15 minutes) is fixed by spec; this only bounds how
/// promptly a completed bucket gets backfilled.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Parser)]
#[command(name = "status-aggregator")]
#[command(about = "Aggregates job counts and durations into 15-minute buckets", long_about = None)]
struct Cli {
    /// NATS server URL, used only to poll the jobs queue's depth.
    #[arg(long, env = "PIPELINE_NATS_URL", default_value = "nats://127.0.0.1:4222")]
    nats_url: String,

    /// Subject/stream/consumer whose pending-message count is sampled for
    /// the open bucket's queue-depth snapshot.
    #[arg(long, env = "PIPELINE_JOBS_SUBJECT", default_value = "pipeline.jobs")]
    jobs_subject: String,

    /// Directory holding the job store.
    #[arg(long, env = "PIPELINE_ROOT")]
    jobs_root: Option<String>,

    /// Directory holding aggregate bucket rows. Defaults to a sibling
    /// `aggregates` directory next to the job store root.
    #[arg(long, env = "PIPELINE_AGGREGATES_ROOT")]
    aggregates_root: Option<String>,

    /// Seconds between wake-ups.
    #[arg(long, env = "PIPELINE_AGGREGATOR_POLL_SECS", default_value_t = DEFAULT_POLL_INTERVAL_SECS)]
    poll_interval_secs: u64,

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
        tracing::error!(error = %e, "status-aggregator exited with a fatal error");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let jobs_root = resolve_root(cli.jobs_root.as_deref());
    let aggregates_root = cli.aggregates_root.map(std::path::PathBuf::from).unwrap_or_else(|| {
        jobs_root
            .parent()
            .map(|p| p.join("aggregates"))
            .unwrap_or_else(|| jobs_root.join("aggregates"))
    });

    let job_store = FileJobStore::new(jobs_root);
    let aggregates = FileAggregateStore::new(aggregates_root);
    let jobs_queue = NatsQueue::<pipeline_core::SubJob>::connect(NatsQueueConfig {
        url: cli.nats_url,
        subject: cli.jobs_subject,
        stream_name: "PIPELINE_JOBS".to_string(),
        durable_name: "status-aggregator-depth".to_string(),
    })
    .await
    .context("failed to bind jobs queue for depth polling")?;

    let poll_interval = Duration::from_secs(cli.poll_interval_secs.max(1));
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("failed to install SIGTERM handler")?;

    loop {
        if let Err(e) = tick(&job_store, &aggregates, &jobs_queue).await {
            tracing::error!(error = %e, "aggregator tick failed, will retry next wake-up");
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, exiting");
                return Ok(());
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received SIGINT, exiting");
                return Ok(());
            }
        }
    }
}

/// One pass: backfill every completed bucket since the last aggregate row,
/// then refresh the current open bucket's snapshot last — the open bucket
/// is always updated last.
async fn tick<S, Q>(job_store: &S, aggregates: &FileAggregateStore, jobs_queue: &Q) -> Result<()>
where
    S: JobStore,
    Q: Queue<pipeline_core::SubJob>,
{
    let now = now_unix();
    let current = bucket_start(now);

    let latest = aggregates.latest().await.context("reading latest aggregate")?;
    let mut next = latest.map(|a| a.bucket_start + BUCKET_SECS).unwrap_or(current);

    while next < current {
        let agg = compute_bucket(job_store, next, 0)
            .await
            .with_context(|| format!("computing backfilled bucket {next}"))?;
        aggregates.put(&agg).await.context("persisting backfilled bucket")?;
        tracing::info!(bucket_start = next, "backfilled aggregate bucket");
        next += BUCKET_SECS;
    }

    let depth = jobs_queue.get_messages_count().await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to poll jobs queue depth, recording 0");
        0
    });
    let open = compute_bucket(job_store, current, depth)
        .await
        .context("computing open bucket")?;
    aggregates.put(&open).await.context("persisting open bucket")?;

    Ok(())
}

fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

