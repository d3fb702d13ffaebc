use std::path::PathBuf;

/// Default deadline (seconds) applied when a sub-job does not carry its own
/// `maxRunTime`.
pub const DEFAULT_RUN_TIME_SECS: u64 = 120;

/// Default hard cap on a single results-queue message: the bus-specific
/// value implementers are expected to configure.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 256 * 1024;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub scan_runner_path: PathBuf,
    pub max_concurrency: usize,
    pub default_run_time: u64,
    pub max_message_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            scan_runner_path: PathBuf::from("scan-runner"),
            max_concurrency: 1,
            default_run_time: DEFAULT_RUN_TIME_SECS,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}
