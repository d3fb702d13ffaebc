//! Computes one bucket's `Aggregate` row from the full set of durable job
//! records.

use pipeline_core::time::parse_rfc3339;
use pipeline_datastore::{DatastoreError, JobStore};

use crate::model::{bucket_start, Aggregate};

fn in_bucket(ts: Option<u64>, bucket: u64) -> bool {
    ts.map(|t| bucket_start(t) == bucket).unwrap_or(false)
}

/// Scans every job the store knows about and tallies the counts and
/// averages for `bucket`. `queue_depth` is supplied by the caller (a live
/// poll of the bus), since it is not derivable from job history.
pub async fn compute_bucket<S: JobStore>(
    store: &S,
    bucket: u64,
    queue_depth: u64,
) -> Result<Aggregate, DatastoreError> {
    let ids = store.list_ids().await?;

    let mut agg = Aggregate::empty(bucket);
    agg.queue_depth = queue_depth;

    let mut start_deltas_ms = Vec::new();
    let mut finish_deltas_ms = Vec::new();

    for id in ids {
        let job = store.get(&id).await?;
        let queued = parse_rfc3339(&job.queued);
        let started = job.started.as_deref().and_then(parse_rfc3339);
        let finished = job.finished.as_deref().and_then(parse_rfc3339);

        if in_bucket(queued, bucket) {
            agg.queued += 1;
        }
        if in_bucket(started, bucket) {
            agg.started += 1;
        }
        if in_bucket(finished, bucket) {
            agg.finished += 1;
            if let (Some(q), Some(s)) = (queued, started) {
                start_deltas_ms.push((s.saturating_sub(q) as f64) * 1000.0);
            }
            if let (Some(s), Some(f)) = (started, finished) {
                finish_deltas_ms.push((f.saturating_sub(s) as f64) * 1000.0);
            }
        }
    }

    agg.average_start_ms = mean(&start_deltas_ms);
    agg.average_finish_ms = mean(&finish_deltas_ms);
    Ok(agg)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_core::{ConfigBundle, HintConfigEntry, Job, JobStatus};
    use pipeline_datastore::FileJobStore;

    fn bundle() -> ConfigBundle {
        let mut b = ConfigBundle::new();
        b.insert("axe".to_string(), HintConfigEntry::Severity("warning".into()));
        b
    }

    #[tokio::test]
    async fn counts_and_averages_jobs_finishing_in_the_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::new(dir.path().to_path_buf());

        let mut job = Job::new_pending("https://example.com", vec![bundle()], 30);
        job.queued = "2024-01-01T00:00:00Z".to_string();
        job.started = Some("2024-01-01T00:01:00Z".to_string());
        job.finished = Some("2024-01-01T00:03:00Z".to_string());
        job.status = JobStatus::Finished;
        store.create(&job).await.unwrap();

        let bucket = bucket_start(parse_rfc3339("2024-01-01T00:03:00Z").unwrap());
        let agg = compute_bucket(&store, bucket, 5).await.unwrap();

        assert_eq!(agg.finished, 1);
        assert_eq!(agg.average_start_ms, Some(60_000.0));
        assert_eq!(agg.average_finish_ms, Some(120_000.0));
        assert_eq!(agg.queue_depth, 5);
    }

    #[tokio::test]
    async fn jobs_outside_the_bucket_are_not_counted() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::new(dir.path().to_path_buf());

        let mut job = Job::new_pending("https://example.com", vec![bundle()], 30);
        job.queued = "2024-01-01T00:00:00Z".to_string();
        store.create(&job).await.unwrap();

        let other_bucket = bucket_start(parse_rfc3339("2024-01-01T01:00:00Z").unwrap());
        let agg = compute_bucket(&store, other_bucket, 0).await.unwrap();
        assert_eq!(agg.queued, 0);
    }
}
