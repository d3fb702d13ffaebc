//! Worker top-level loop: binds the jobs and results queues, bounds
//! concurrency with a semaphore (default one sub-job at a time per
//! process), and hands each sub-job to `process::process_sub_job`.

use std::sync::Arc;

use anyhow::Result;
use pipeline_core::{ResultMessage, SubJob};
use pipeline_queue::Queue;
use tokio::sync::{watch, Semaphore};

use crate::config::WorkerConfig;
use crate::process::process_sub_job;

/// Runs the worker's handler loop until `jobs` closes or its subscription
/// ends. `shutdown` should flip to `true` once, on `SIGTERM`/`SIGINT`; any
/// sub-job already running at that point is killed and reported failed.
pub async fn run<J, R>(
    jobs: Arc<J>,
    results: Arc<R>,
    config: WorkerConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    J: Queue<SubJob> + Send + Sync + 'static,
    R: Queue<ResultMessage> + Send + Sync + 'static,
{
    let semaphore = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
    let config = Arc::new(config);

    jobs.listen(move |sub_job: SubJob| {
        let semaphore = semaphore.clone();
        let results = results.clone();
        let config = config.clone();
        let shutdown = shutdown.clone();
        async move {
            let Ok(permit) = semaphore.acquire_owned().await else {
                return;
            };
            tokio::spawn(async move {
                process_sub_job(sub_job, &config, results.as_ref(), shutdown).await;
                drop(permit);
            });
        }
    })
    .await?;

    Ok(())
}
