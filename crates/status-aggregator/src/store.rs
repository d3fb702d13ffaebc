//! File-backed store for `Aggregate` rows: one JSON file per bucket,
//! directly modeled on `pipeline-datastore`'s `FileJobStore` meta/state
//! split, simplified to a single file since a bucket's whole row is
//! rewritten on every update rather than split into fixed/mutable halves.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::Aggregate;

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub struct FileAggregateStore {
    root: PathBuf,
}

impl FileAggregateStore {
    pub fn new(root: PathBuf) -> Self {
        FileAggregateStore { root }
    }

    fn path(&self, bucket_start: u64) -> PathBuf {
        self.root.join(format!("{bucket_start}.json"))
    }

    pub async fn get(&self, bucket_start: u64) -> Result<Option<Aggregate>, AggregateError> {
        match tokio::fs::read(self.path(bucket_start)).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn put(&self, aggregate: &Aggregate) -> Result<(), AggregateError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let bytes = serde_json::to_vec_pretty(aggregate)?;
        tokio::fs::write(self.path(aggregate.bucket_start), bytes).await?;
        Ok(())
    }

    /// The most recently written bucket, or `None` if the store is empty
    /// (first run).
    pub async fn latest(&self) -> Result<Option<Aggregate>, AggregateError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut latest: Option<u64> = None;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|s| s.strip_suffix(".json")) else {
                continue;
            };
            if let Ok(bucket_start) = stem.parse::<u64>() {
                latest = Some(latest.map_or(bucket_start, |l: u64| l.max(bucket_start)));
            }
        }

        match latest {
            Some(bucket_start) => self.get(bucket_start).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAggregateStore::new(dir.path().to_path_buf());
        let agg = Aggregate {
            queued: 3,
            started: 2,
            finished: 1,
            average_start_ms: Some(1500.0),
            average_finish_ms: Some(4200.0),
            queue_depth: 7,
            ..Aggregate::empty(900)
        };
        store.put(&agg).await.unwrap();
        let fetched = store.get(900).await.unwrap().unwrap();
        assert_eq!(fetched, agg);
    }

    #[tokio::test]
    async fn latest_picks_the_highest_bucket_start() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAggregateStore::new(dir.path().to_path_buf());
        store.put(&Aggregate::empty(900)).await.unwrap();
        store.put(&Aggregate::empty(1800)).await.unwrap();
        store.put(&Aggregate::empty(900)).await.unwrap();

        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.bucket_start, 1800);
    }

    #[tokio::test]
    async fn latest_is_none_for_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileAggregateStore::new(dir.path().to_path_buf());
        assert!(store.latest().await.unwrap().is_none());
    }
}
