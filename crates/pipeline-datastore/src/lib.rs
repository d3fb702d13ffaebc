//! `JobStore`/`LockManager` boundary: the durable record and the
//! distributed lock the Sync Service merges under. Database driver
//! specifics are out of scope, so this crate ships one reference
//! implementation, file-backed, directly modeled on the job-directory
//! persistence this workspace grew out of.

mod file_store;
mod lock;
mod root;

pub use file_store::FileJobStore;
pub use lock::{FileLockManager, Lock};
pub use root::resolve_root;

use std::future::Future;

use pipeline_core::{Job, JobId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("lock held by another owner for job {0}")]
    Locked(JobId),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Durable storage for Job records.
pub trait JobStore: Send + Sync {
    fn create(&self, job: &Job) -> impl Future<Output = Result<(), DatastoreError>> + Send;
    fn get(&self, id: &JobId) -> impl Future<Output = Result<Job, DatastoreError>> + Send;
    fn put(&self, job: &Job) -> impl Future<Output = Result<(), DatastoreError>> + Send;
    /// All known job ids, for the status aggregator's bucket scans.
    fn list_ids(&self) -> impl Future<Output = Result<Vec<JobId>, DatastoreError>> + Send;
}

/// A distributed lock keyed by job id, acquired for the duration of one
/// merge.
pub trait LockManager: Send + Sync {
    fn lock(&self, id: &JobId) -> impl Future<Output = Result<Lock, DatastoreError>> + Send;
    fn unlock(&self, lock: Lock) -> impl Future<Output = Result<(), DatastoreError>> + Send;
}
