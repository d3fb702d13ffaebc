//! NATS JetStream-backed `Queue` implementation. Each binding owns one
//! durable pull consumer on one subject, giving the at-least-once,
//! competing-consumers semantics the spec assumes of "the bus".

use std::future::Future;
use std::marker::PhantomData;

use async_nats::jetstream::{self, consumer::pull, stream};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Queue, QueueError, SendOutcome};

/// Connection and subject configuration for one `NatsQueue` binding.
#[derive(Debug, Clone)]
pub struct NatsQueueConfig {
    pub url: String,
    pub subject: String,
    pub stream_name: String,
    pub durable_name: String,
}

pub struct NatsQueue<M> {
    jetstream: jetstream::Context,
    config: NatsQueueConfig,
    _marker: PhantomData<fn() -> M>,
}

impl<M> NatsQueue<M> {
    /// Connects to `config.url` and ensures the backing stream and durable
    /// consumer exist, creating them if this is the first binding to do so.
    pub async fn connect(config: NatsQueueConfig) -> Result<Self, QueueError> {
        let client = async_nats::connect(&config.url)
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;
        let jetstream = jetstream::new(client);

        jetstream
            .get_or_create_stream(stream::Config {
                name: config.stream_name.clone(),
                subjects: vec![config.subject.clone()],
                ..Default::default()
            })
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;

        Ok(NatsQueue {
            jetstream,
            config,
            _marker: PhantomData,
        })
    }

    async fn consumer(&self) -> Result<pull::Stream, QueueError> {
        let stream = self
            .jetstream
            .get_stream(&self.config.stream_name)
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;
        let consumer = stream
            .get_or_create_consumer(
                &self.config.durable_name,
                pull::Config {
                    durable_name: Some(self.config.durable_name.clone()),
                    filter_subject: self.config.subject.clone(),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;
        consumer
            .messages()
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))
    }
}

impl<M> Queue<M> for NatsQueue<M>
where
    M: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn listen<F, Fut>(&self, handler: F) -> Result<(), QueueError>
    where
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut messages = self.consumer().await?;
        while let Some(next) = messages.next().await {
            let msg = match next {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(error = %e, "jetstream pull error, continuing");
                    continue;
                }
            };
            match serde_json::from_slice::<M>(&msg.payload) {
                Ok(decoded) => {
                    handler(decoded).await;
                    if let Err(e) = msg.ack().await {
                        tracing::warn!(error = ?e, "failed to ack jetstream message");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "dropping message with undecodable payload");
                    let _ = msg.ack().await;
                }
            }
        }
        Ok(())
    }

    async fn send_message(&self, msg: &M) -> SendOutcome {
        let bytes = match serde_json::to_vec(msg) {
            Ok(b) => b,
            Err(e) => return SendOutcome::Fatal(QueueError::Serde(e)),
        };
        match self
            .jetstream
            .publish(self.config.subject.clone(), bytes.into())
            .await
        {
            Ok(ack) => match ack.await {
                Ok(_) => SendOutcome::Ok,
                Err(e) => classify_publish_error(&e),
            },
            Err(e) => classify_publish_error(&e),
        }
    }

    async fn get_messages_count(&self) -> Result<u64, QueueError> {
        let stream = self
            .jetstream
            .get_stream(&self.config.stream_name)
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;
        let mut consumer = stream
            .get_or_create_consumer(
                &self.config.durable_name,
                pull::Config {
                    durable_name: Some(self.config.durable_name.clone()),
                    filter_subject: self.config.subject.clone(),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;
        let info = consumer
            .info()
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;
        Ok(info.num_pending)
    }
}

fn classify_publish_error(e: &impl std::fmt::Display) -> SendOutcome {
    let text = e.to_string();
    if text.to_lowercase().contains("maximum") && text.to_lowercase().contains("size") {
        SendOutcome::Oversize
    } else {
        SendOutcome::Transient(QueueError::Transport(text))
    }
}
