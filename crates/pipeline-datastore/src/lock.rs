//! File-backed lease lock for `lock(jobId)`/`unlock(lock)`. The lease is a
//! sibling file created with `create_new`, so acquisition is atomic at the
//! filesystem level; staleness is handled by TTL expiry
//! rather than any cooperative release protocol.

use std::path::PathBuf;
use std::time::Duration;

use pipeline_core::JobId;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use ulid::Ulid;

use crate::DatastoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Lease {
    held_by: String,
    expires_at: u64,
}

/// A held lease on one job id. Dropping this without calling
/// [`LockManager::unlock`][crate::LockManager::unlock] leaves the lease in
/// place until it expires naturally — merge code should always unlock in a
/// `finally`-style path.
pub struct Lock {
    pub job_id: JobId,
    token: String,
    path: PathBuf,
}

pub struct FileLockManager {
    root: PathBuf,
    ttl: Duration,
    holder_id: String,
}

impl FileLockManager {
    pub fn new(root: PathBuf, ttl: Duration, holder_id: impl Into<String>) -> Self {
        FileLockManager {
            root,
            ttl,
            holder_id: holder_id.into(),
        }
    }

    fn lease_path(&self, id: &JobId) -> PathBuf {
        self.root.join(format!("{id}.lock"))
    }

    async fn try_create(&self, path: &PathBuf, lease: &Lease) -> std::io::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;
        let bytes = serde_json::to_vec(lease).expect("Lease serializes");
        file.write_all(&bytes).await?;
        Ok(())
    }
}

impl crate::LockManager for FileLockManager {
    async fn lock(&self, id: &JobId) -> Result<Lock, DatastoreError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.lease_path(id);
        let token = Ulid::new().to_string();
        let now = now_unix();
        let lease = Lease {
            held_by: format!("{}:{token}", self.holder_id),
            expires_at: now + self.ttl.as_secs(),
        };

        match self.try_create(&path, &lease).await {
            Ok(()) => Ok(Lock {
                job_id: id.clone(),
                token: lease.held_by,
                path,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let stale = match tokio::fs::read(&path).await {
                    Ok(raw) => serde_json::from_slice::<Lease>(&raw)
                        .map(|existing| existing.expires_at < now)
                        .unwrap_or(true),
                    Err(_) => true,
                };
                if !stale {
                    return Err(DatastoreError::Locked(id.clone()));
                }
                // The previous holder's lease expired without being
                // released; steal it and retry once.
                let _ = tokio::fs::remove_file(&path).await;
                self.try_create(&path, &lease).await?;
                Ok(Lock {
                    job_id: id.clone(),
                    token: lease.held_by,
                    path,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn unlock(&self, lock: Lock) -> Result<(), DatastoreError> {
        if let Ok(raw) = tokio::fs::read(&lock.path).await {
            if let Ok(existing) = serde_json::from_slice::<Lease>(&raw) {
                if existing.held_by != lock.token {
                    // Already stolen by another holder after our lease expired.
                    return Ok(());
                }
            }
        }
        let _ = tokio::fs::remove_file(&lock.path).await;
        Ok(())
    }
}

fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LockManager;

    #[tokio::test]
    async fn second_lock_attempt_is_rejected_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = FileLockManager::new(dir.path().to_path_buf(), Duration::from_secs(30), "sync-1");
        let id = JobId::from("job-a");
        let lock = mgr.lock(&id).await.unwrap();

        let second = mgr.lock(&id).await;
        assert!(matches!(second, Err(DatastoreError::Locked(_))));

        mgr.unlock(lock).await.unwrap();
        assert!(mgr.lock(&id).await.is_ok());
    }

    #[tokio::test]
    async fn expired_lease_can_be_stolen() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = FileLockManager::new(dir.path().to_path_buf(), Duration::from_secs(0), "sync-1");
        let id = JobId::from("job-b");
        let first = mgr.lock(&id).await.unwrap();
        // TTL of zero means the lease is already expired by the time the
        // next holder looks at it.
        std::thread::sleep(Duration::from_millis(1100));
        let second = mgr.lock(&id).await;
        assert!(second.is_ok());
        // Original holder's unlock is then a no-op; it no longer owns the lease.
        mgr.unlock(first).await.unwrap();
    }
}
