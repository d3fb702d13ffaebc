//! Sync top-level loop: subscribes to the results queue and merges each
//! message into the durable job record under its per-job lock.

use std::sync::Arc;

use anyhow::Result;
use pipeline_core::ResultMessage;
use pipeline_datastore::{DatastoreError, JobStore, LockManager};
use pipeline_queue::Queue;

use crate::merge_loop::handle_message;

pub async fn run<Q, S, L>(results: Arc<Q>, store: Arc<S>, locks: Arc<L>) -> Result<()>
where
    Q: Queue<ResultMessage> + Send + Sync + 'static,
    S: JobStore + Send + Sync + 'static,
    L: LockManager + Send + Sync + 'static,
{
    results
        .listen(move |msg: ResultMessage| {
            let store = store.clone();
            let locks = locks.clone();
            async move {
                match handle_message(store.as_ref(), locks.as_ref(), &msg).await {
                    Ok(()) => {}
                    Err(DatastoreError::Locked(id)) => {
                        tracing::warn!(job_id = %id, "job lock held elsewhere, dropping message for redelivery");
                    }
                    Err(DatastoreError::NotFound(id)) => {
                        tracing::error!(job_id = %id, "result message for unknown job, dropping");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, id = %msg.id(), "failed to merge result message");
                    }
                }
            }
        })
        .await?;

    Ok(())
}
