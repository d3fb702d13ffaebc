//! The `Queue` abstraction: a typed wrapper over the message bus exposing
//! `listen(handler)`, `send_message(msg)`, and `get_messages_count()`.
//! Two implementations ship: an in-memory one for tests and a NATS-backed
//! one for production.

mod inmemory;
mod nats;
mod retry;

pub use inmemory::InMemoryQueue;
pub use nats::{NatsQueue, NatsQueueConfig};
pub use retry::{send_with_retry, RetryPolicy};

use std::future::Future;

use thiserror::Error;

/// Errors surfaced by a `Queue` implementation's transport layer.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue transport error: {0}")]
    Transport(String),
    #[error("queue is not connected")]
    NotConnected,
    #[error("message serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Outcome of a single `send_message` attempt, replacing the
/// exception-driven control flow around oversize rejection with an
/// explicit result type: only `Oversize` should ever trigger the
/// collapse-and-retry path.
#[derive(Debug)]
pub enum SendOutcome {
    Ok,
    Oversize,
    Transient(QueueError),
    Fatal(QueueError),
}

/// A named binding onto the message bus, parameterized over the message
/// type it carries (`SubJob` for the jobs queue, `ResultMessage` for the
/// results queue).
pub trait Queue<M>: Send + Sync
where
    M: Send + 'static,
{
    /// Subscribes and invokes `handler` once per incoming message. Returns
    /// once the subscription ends (transport closed, or graceful
    /// unsubscribe); callers that want to run this as a background task
    /// should `tokio::spawn` it.
    fn listen<F, Fut>(&self, handler: F) -> impl Future<Output = Result<(), QueueError>> + Send
    where
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static;

    fn send_message(&self, msg: &M) -> impl Future<Output = SendOutcome> + Send;

    fn get_messages_count(&self) -> impl Future<Output = Result<u64, QueueError>> + Send;
}
