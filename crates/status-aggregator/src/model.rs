//! The aggregator's own small record type: one row per completed (or
//! currently open) quarter-hour bucket.

use serde::{Deserialize, Serialize};

/// Bucket width, in seconds: quarter-hour boundaries.
pub const BUCKET_SECS: u64 = 15 * 60;

/// Rounds `ts` down to the start of its containing bucket.
pub fn bucket_start(ts: u64) -> u64 {
    (ts / BUCKET_SECS) * BUCKET_SECS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub bucket_start: u64,
    pub queued: u64,
    pub started: u64,
    pub finished: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_start_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_finish_ms: Option<f64>,
    pub queue_depth: u64,
}

impl Aggregate {
    pub fn empty(bucket_start: u64) -> Self {
        Aggregate {
            bucket_start,
            queued: 0,
            started: 0,
            finished: 0,
            average_start_ms: None,
            average_finish_ms: None,
            queue_depth: 0,
        }
    }
}
