//! File-backed `JobStore`: one directory per job holding `meta.json` (the
//! fields fixed at creation) and `state.json` (the fields the Sync Service
//! mutates on every merge), mirroring the meta/state split this workspace's
//! job-directory tooling already used for process supervision.

use std::path::PathBuf;

use pipeline_core::{ConfigBundle, ErrorPayload, HintResult, Job, JobId, JobStatus};
use serde::{Deserialize, Serialize};

use crate::DatastoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JobMeta {
    id: JobId,
    url: String,
    config: Vec<ConfigBundle>,
    queued: String,
    max_run_time: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JobState {
    status: JobStatus,
    hints: Vec<HintResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    started: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    finished: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    engine_version: Option<String>,
}

fn split(job: &Job) -> (JobMeta, JobState) {
    (
        JobMeta {
            id: job.id.clone(),
            url: job.url.clone(),
            config: job.config.clone(),
            queued: job.queued.clone(),
            max_run_time: job.max_run_time,
        },
        JobState {
            status: job.status,
            hints: job.hints.clone(),
            started: job.started.clone(),
            finished: job.finished.clone(),
            error: job.error.clone(),
            engine_version: job.engine_version.clone(),
        },
    )
}

fn combine(meta: JobMeta, state: JobState) -> Job {
    Job {
        id: meta.id,
        url: meta.url,
        status: state.status,
        hints: state.hints,
        config: meta.config,
        queued: meta.queued,
        started: state.started,
        finished: state.finished,
        max_run_time: meta.max_run_time,
        error: state.error,
        engine_version: state.engine_version,
    }
}

/// File-backed `JobStore`. `root` holds one subdirectory per job id.
pub struct FileJobStore {
    root: PathBuf,
}

impl FileJobStore {
    pub fn new(root: PathBuf) -> Self {
        FileJobStore { root }
    }

    fn job_dir(&self, id: &JobId) -> PathBuf {
        self.root.join(id.to_string())
    }

    fn meta_path(&self, id: &JobId) -> PathBuf {
        self.job_dir(id).join("meta.json")
    }

    fn state_path(&self, id: &JobId) -> PathBuf {
        self.job_dir(id).join("state.json")
    }
}

impl crate::JobStore for FileJobStore {
    async fn create(&self, job: &pipeline_core::Job) -> Result<(), DatastoreError> {
        let dir = self.job_dir(&job.id);
        if dir.exists() {
            return Err(DatastoreError::AlreadyExists(job.id.clone()));
        }
        tokio::fs::create_dir_all(&dir).await?;

        let (meta, state) = split(job);
        tokio::fs::write(self.meta_path(&job.id), serde_json::to_vec_pretty(&meta)?).await?;
        tokio::fs::write(self.state_path(&job.id), serde_json::to_vec_pretty(&state)?).await?;
        Ok(())
    }

    async fn get(&self, id: &JobId) -> Result<pipeline_core::Job, DatastoreError> {
        let meta_raw = tokio::fs::read(self.meta_path(id))
            .await
            .map_err(|_| DatastoreError::NotFound(id.clone()))?;
        let state_raw = tokio::fs::read(self.state_path(id))
            .await
            .map_err(|_| DatastoreError::NotFound(id.clone()))?;
        let meta: JobMeta = serde_json::from_slice(&meta_raw)?;
        let state: JobState = serde_json::from_slice(&state_raw)?;
        Ok(combine(meta, state))
    }

    async fn put(&self, job: &pipeline_core::Job) -> Result<(), DatastoreError> {
        if !self.meta_path(&job.id).exists() {
            return Err(DatastoreError::NotFound(job.id.clone()));
        }
        let (_, state) = split(job);
        tokio::fs::write(self.state_path(&job.id), serde_json::to_vec_pretty(&state)?).await?;
        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<JobId>, DatastoreError> {
        let mut ids = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(JobId::from(name));
                }
            }
        }
        Ok(ids)
    }
}
