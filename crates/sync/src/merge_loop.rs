//! Applies one incoming `ResultMessage` to the durable job record under the
//! per-job lock: lock, get, merge, put, unlock.

use pipeline_core::{merge, JobId, ResultMessage};
use pipeline_datastore::{DatastoreError, JobStore, LockManager};

/// Locks `msg.id()`, loads the job, applies the merge algorithm, and
/// persists the result. A lock that is currently held by another sync
/// process is not retried here; the message is assumed to be redelivered by
/// the bus's at-least-once semantics, so the caller should simply drop it
/// and move on rather than block the handler loop.
pub async fn handle_message<S, L>(
    store: &S,
    locks: &L,
    msg: &ResultMessage,
) -> Result<(), DatastoreError>
where
    S: JobStore,
    L: LockManager,
{
    let id: JobId = msg.id().clone();
    let lock = locks.lock(&id).await?;

    let result = async {
        let mut job = store.get(&id).await?;
        merge::apply_result(&mut job, msg);
        store.put(&job).await
    }
    .await;

    locks.unlock(lock).await?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_core::{ConfigBundle, HintConfigEntry, HintResult, HintStatus, Job, PartInfo, ResultCommon};
    use pipeline_datastore::{FileJobStore, FileLockManager};
    use std::time::Duration;

    fn bundle() -> ConfigBundle {
        let mut b = ConfigBundle::new();
        b.insert("axe".to_string(), HintConfigEntry::Severity("warning".into()));
        b
    }

    #[tokio::test]
    async fn applies_a_finished_message_under_lock() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::new(dir.path().to_path_buf());
        let locks = FileLockManager::new(dir.path().to_path_buf(), Duration::from_secs(30), "sync-1");

        let job = Job::new_pending("https://example.com", vec![bundle()], 30);
        store.create(&job).await.unwrap();

        let msg = ResultMessage::Finished {
            common: ResultCommon {
                id: job.id.clone(),
                part_info: PartInfo { part: 0, total_parts: 1 },
                hints: vec![HintResult {
                    name: "axe".into(),
                    status: HintStatus::Pass,
                    messages: vec![],
                }],
            },
            finished: "2024-01-01T00:01:00Z".to_string(),
            error: None,
        };

        handle_message(&store, &locks, &msg).await.unwrap();

        let updated = store.get(&job.id).await.unwrap();
        assert_eq!(updated.status, pipeline_core::JobStatus::Finished);
    }

    #[tokio::test]
    async fn dropping_unknown_job_id_surfaces_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::new(dir.path().to_path_buf());
        let locks = FileLockManager::new(dir.path().to_path_buf(), Duration::from_secs(30), "sync-1");

        let msg = ResultMessage::Finished {
            common: ResultCommon {
                id: pipeline_core::JobId::from("missing"),
                part_info: PartInfo { part: 0, total_parts: 1 },
                hints: vec![],
            },
            finished: "2024-01-01T00:01:00Z".to_string(),
            error: None,
        };

        let err = handle_message(&store, &locks, &msg).await.unwrap_err();
        assert!(matches!(err, DatastoreError::NotFound(_)));
    }
}
