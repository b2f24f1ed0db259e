//! Resolve requests arriving over Redis Pub/Sub.
//!
//! Each message on `consumer.channel` is a `ResolveEvent`. The template is
//! resolved and the event, with `resolvedMessage` filled in, is published
//! reliably to `consumer.output_channel` keyed by `requestId`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::{ConsumerConfig, RedisConfig};
use crate::localization::MessageService;
use crate::metrics::ConsumerMetrics;
use crate::publish::{PublishOutcome, ReliablePublisher};
use crate::redis::{BackoffConfig, ExponentialBackoff, RedisPool};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveEvent {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_service: Option<String>,
    #[serde(alias = "messageTemplateID")]
    pub template_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// How a single consumed message ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeResult {
    /// Resolved and delivered downstream
    Resolved,
    /// Unparseable or missing required fields; dropped
    Invalid,
    /// Resolution or delivery failed
    Failed,
}

#[derive(Debug, Error)]
enum SubscriptionError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Message stream ended")]
    StreamEnded,
}

pub struct ResolveRequestConsumer {
    config: ConsumerConfig,
    backoff: BackoffConfig,
    pool: Arc<RedisPool>,
    messages: Arc<MessageService>,
    publisher: Option<Arc<ReliablePublisher>>,
    permits: Arc<Semaphore>,
    shutdown: CancellationToken,
}

impl ResolveRequestConsumer {
    pub fn new(
        config: ConsumerConfig,
        redis: &RedisConfig,
        pool: Arc<RedisPool>,
        messages: Arc<MessageService>,
        publisher: Option<Arc<ReliablePublisher>>,
        shutdown: CancellationToken,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.concurrency.max(1)));
        Self {
            config,
            backoff: BackoffConfig::from(redis),
            pool,
            messages,
            publisher,
            permits,
            shutdown,
        }
    }

    /// Subscribes and processes messages until shutdown, reconnecting with
    /// exponential backoff. In-flight messages finish before it returns.
    pub async fn run(self: Arc<Self>) {
        tracing::info!(
            channel = %self.config.channel,
            output_channel = %self.config.output_channel,
            concurrency = self.config.concurrency,
            "Starting resolve request consumer"
        );

        let mut backoff = ExponentialBackoff::with_config(self.backoff.clone());

        while !self.shutdown.is_cancelled() {
            let error = match self.clone().consume(&mut backoff).await {
                Ok(()) => break,
                Err(e) => e,
            };

            let delay = backoff.next_delay();
            tracing::error!(
                error = %error,
                attempt = backoff.attempt(),
                delay_ms = delay.as_millis() as u64,
                "Resolve consumer subscription lost, reconnecting"
            );

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let all = self.config.concurrency.max(1) as u32;
        if self.permits.acquire_many(all).await.is_err() {
            tracing::warn!("Consumer permits closed before draining");
        }
        tracing::info!("Resolve request consumer stopped");
    }

    /// Returns `Ok` only on shutdown.
    async fn consume(
        self: Arc<Self>,
        backoff: &mut ExponentialBackoff,
    ) -> Result<(), SubscriptionError> {
        let mut pubsub = self.pool.client().get_async_pubsub().await?;
        pubsub.subscribe(&self.config.channel).await?;
        backoff.reset();
        tracing::info!(channel = %self.config.channel, "Redis subscription established");

        let mut message_stream = pubsub.on_message();

        loop {
            let msg = tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                msg = message_stream.next() => msg,
            };
            let Some(msg) = msg else {
                return Err(SubscriptionError::StreamEnded);
            };

            let payload: String = match msg.get_payload() {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to get message payload");
                    ConsumerMetrics::record_invalid();
                    continue;
                }
            };

            let permit = tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                permit = self.permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return Ok(()),
                },
            };

            let this = self.clone();
            tokio::spawn(async move {
                ConsumerMetrics::inc_in_flight();
                this.process(&payload).await;
                ConsumerMetrics::dec_in_flight();
                drop(permit);
            });
        }
    }

    /// Handles one raw message and records the result.
    pub async fn process(&self, payload: &str) -> ConsumeResult {
        let result = self.handle(payload).await;
        match result {
            ConsumeResult::Resolved => ConsumerMetrics::record_resolved(),
            ConsumeResult::Invalid => ConsumerMetrics::record_invalid(),
            ConsumeResult::Failed => ConsumerMetrics::record_failed(),
        }
        result
    }

    async fn handle(&self, payload: &str) -> ConsumeResult {
        let mut event: ResolveEvent = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse resolve request");
                return ConsumeResult::Invalid;
            }
        };
        if event.request_id.is_empty() {
            tracing::warn!(template_id = %event.template_id, "Resolve request without requestId");
            return ConsumeResult::Invalid;
        }

        let locale = event.locale.clone().unwrap_or_default();
        let text = match self
            .messages
            .resolve(&event.template_id, &locale, &event.args)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(
                    request_id = %event.request_id,
                    template_id = %event.template_id,
                    error = %e,
                    "Failed to resolve request"
                );
                return ConsumeResult::Failed;
            }
        };
        event.resolved_message = Some(text);
        event.timestamp = Some(Utc::now());

        let Some(publisher) = self.publisher.as_ref() else {
            tracing::warn!(
                request_id = %event.request_id,
                "Publisher disabled, resolved message not forwarded"
            );
            return ConsumeResult::Failed;
        };

        let body = match serde_json::to_string(&event) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(request_id = %event.request_id, error = %e, "Failed to serialize response");
                return ConsumeResult::Failed;
            }
        };

        match publisher
            .publish_with_cancel(
                &self.config.output_channel,
                &event.request_id,
                &body,
                &self.shutdown,
            )
            .await
        {
            Ok(PublishOutcome::Sent { .. }) => {
                tracing::debug!(request_id = %event.request_id, "Resolve request answered");
                ConsumeResult::Resolved
            }
            Ok(_) => ConsumeResult::Failed,
            Err(e) => {
                tracing::error!(request_id = %event.request_id, error = %e, "Publish rejected");
                ConsumeResult::Failed
            }
        }
    }
}
