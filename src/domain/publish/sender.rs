//! Single-attempt message sending.
//!
//! `MessageSender::send` resolves only once the broker acknowledged the
//! record or the attempt failed; retrying is the publisher's concern.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::redis::{PoolError, RedisPool, RedisPoolExt};

/// One send attempt. Lives only for the duration of a publish call.
#[derive(Debug, Clone, Copy)]
pub struct PublishAttempt<'a> {
    pub channel: &'a str,
    pub key: &'a str,
    pub payload: &'a str,
    /// 1-based
    pub attempt_number: u32,
}

/// Broker acknowledgement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    pub record_id: String,
}

#[derive(Debug, Error)]
pub enum SendError {
    /// Broker rejected or failed the write
    #[error("Broker error: {0}")]
    Broker(String),

    /// Broker could not be reached
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    #[error("Send timed out after {0:?}")]
    Timeout(Duration),
}

impl From<PoolError> for SendError {
    fn from(err: PoolError) -> Self {
        if err.is_unavailable() {
            SendError::Unavailable(err.to_string())
        } else {
            SendError::Broker(err.to_string())
        }
    }
}

#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, attempt: &PublishAttempt<'_>) -> Result<SendReceipt, SendError>;
}

/// Appends each message to a Redis Stream named after the channel, with
/// fields `key` and `payload`. The stream entry id is the record id.
pub struct RedisStreamSender {
    pool: Arc<RedisPool>,
    max_len: usize,
}

impl RedisStreamSender {
    pub fn new(pool: Arc<RedisPool>, max_len: usize) -> Self {
        Self { pool, max_len }
    }
}

#[async_trait]
impl MessageSender for RedisStreamSender {
    async fn send(&self, attempt: &PublishAttempt<'_>) -> Result<SendReceipt, SendError> {
        let record_id = self
            .pool
            .xadd_maxlen(
                attempt.channel,
                self.max_len,
                &[("key", attempt.key), ("payload", attempt.payload)],
            )
            .await?;

        Ok(SendReceipt { record_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedisConfig;
    use crate::redis::{CircuitBreaker, RedisHealth};

    #[tokio::test]
    async fn test_open_circuit_is_unavailable() {
        let cb = Arc::new(CircuitBreaker::new("redis"));
        for _ in 0..5 {
            cb.record_failure();
        }
        let pool = RedisPool::new(&RedisConfig::default(), cb, Arc::new(RedisHealth::new())).unwrap();
        let sender = RedisStreamSender::new(Arc::new(pool), 100);

        let attempt = PublishAttempt {
            channel: "pigeon.resolved",
            key: "req-1",
            payload: "{}",
            attempt_number: 1,
        };
        let err = tokio_test::assert_err!(sender.send(&attempt).await);
        assert!(matches!(err, SendError::Unavailable(_)));
    }

    #[test]
    fn test_timeout_display() {
        let err = SendError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "Send timed out after 250ms");
    }
}
