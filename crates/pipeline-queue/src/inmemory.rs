//! An in-process `Queue` implementation backed by a `tokio` mpsc channel.
//! Used by unit/integration tests so worker and sync behavior can be
//! exercised without a running NATS server.

use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, Mutex};

use crate::{Queue, QueueError, SendOutcome};

/// In-memory queue. Optionally enforces a `max_message_size`, so tests can
/// exercise the worker's oversize-rejection retry path without a real bus.
pub struct InMemoryQueue<M> {
    sender: mpsc::UnboundedSender<M>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<M>>>,
    depth: Arc<AtomicI64>,
    max_message_size: Option<usize>,
}

impl<M> InMemoryQueue<M> {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        InMemoryQueue {
            sender,
            receiver: Mutex::new(Some(receiver)),
            depth: Arc::new(AtomicI64::new(0)),
            max_message_size: None,
        }
    }

    pub fn with_max_message_size(mut self, max_size: usize) -> Self {
        self.max_message_size = Some(max_size);
        self
    }

    /// Queues a message for delivery without going through `send_message`'s
    /// size enforcement; used by test harnesses to seed the jobs queue.
    pub fn push(&self, msg: M) {
        self.depth.fetch_add(1, Ordering::SeqCst);
        let _ = self.sender.send(msg);
    }
}

impl<M> Default for InMemoryQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Queue<M> for InMemoryQueue<M>
where
    M: Serialize + Clone + Send + Sync + 'static,
{
    async fn listen<F, Fut>(&self, handler: F) -> Result<(), QueueError>
    where
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut guard = self.receiver.lock().await;
        let mut receiver = guard.take().ok_or(QueueError::NotConnected)?;
        drop(guard);

        while let Some(msg) = receiver.recv().await {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            handler(msg).await;
        }
        Ok(())
    }

    async fn send_message(&self, msg: &M) -> SendOutcome {
        match serde_json::to_vec(msg) {
            Ok(bytes) => {
                if let Some(max) = self.max_message_size {
                    if bytes.len() > max {
                        return SendOutcome::Oversize;
                    }
                }
                self.depth.fetch_add(1, Ordering::SeqCst);
                match self.sender.send(msg.clone()) {
                    Ok(()) => SendOutcome::Ok,
                    Err(_) => SendOutcome::Fatal(QueueError::NotConnected),
                }
            }
            Err(e) => SendOutcome::Fatal(QueueError::Serde(e)),
        }
    }

    async fn get_messages_count(&self) -> Result<u64, QueueError> {
        Ok(self.depth.load(Ordering::SeqCst).max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_message() {
        let queue: InMemoryQueue<String> = InMemoryQueue::new();
        queue.push("hello".to_string());
        assert_eq!(queue.get_messages_count().await.unwrap(), 1);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let queue = Arc::new(queue);
        let q2 = queue.clone();
        tokio::spawn(async move {
            let _ = q2
                .listen(move |msg: String| {
                    let tx = tx.clone();
                    async move {
                        let _ = tx.send(msg);
                    }
                })
                .await;
        });
        let received = rx.recv().await.unwrap();
        assert_eq!(received, "hello");
    }

    #[tokio::test]
    async fn send_rejects_oversize_messages() {
        let queue: InMemoryQueue<String> = InMemoryQueue::new().with_max_message_size(8);
        let outcome = queue.send_message(&"way too long".to_string()).await;
        assert!(matches!(outcome, SendOutcome::Oversize));
    }
}
