//! Bounded exponential backoff for transient queue send failures (spec
//! §4.1 Failure semantics / §7). Oversize rejection is handled separately
//! by the worker, which owns the hint-collapsing retry pass.

use std::time::Duration;

use crate::{Queue, SendOutcome};

/// Retry schedule for transient `send_message` failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 3,
            base: Duration::from_millis(250),
            cap: Duration::from_secs(2),
        }
    }
}

/// Sends `msg` via `queue`, retrying `SendOutcome::Transient` failures with
/// bounded exponential backoff. `Ok`, `Oversize`, and `Fatal` are returned
/// immediately without retrying.
pub async fn send_with_retry<M, Q>(queue: &Q, msg: &M, policy: &RetryPolicy) -> SendOutcome
where
    M: Send + 'static,
    Q: Queue<M>,
{
    let mut delay = policy.base;
    for attempt in 0..policy.attempts.max(1) {
        let outcome = queue.send_message(msg).await;
        match outcome {
            SendOutcome::Transient(e) if attempt + 1 < policy.attempts => {
                tracing::warn!(attempt, error = %e, "transient queue send failure, retrying");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(policy.cap);
            }
            other => return other,
        }
    }
    unreachable!("loop always returns on its final attempt")
}
