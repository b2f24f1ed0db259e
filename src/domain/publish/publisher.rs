//! Reliable publisher with bounded fixed-delay retry.
//!
//! Attempts run strictly one after another. Between attempts the publisher
//! sleeps for `back_off_period`; a cancelled token ends the loop there, never
//! while an attempt is in flight. Exhaustion is reported once through the
//! `DeliveryReporter` and returned as an outcome, not raised.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::PublisherConfig;
use crate::metrics::PublishMetrics;

use super::sender::{MessageSender, PublishAttempt, SendError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first, at least 1
    pub max_attempts: u32,
    pub back_off_period: Duration,
    /// Upper bound for a single attempt
    pub send_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            back_off_period: Duration::from_millis(1000),
            send_timeout: Duration::from_millis(5000),
        }
    }
}

impl From<&PublisherConfig> for RetryPolicy {
    fn from(config: &PublisherConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            back_off_period: config.back_off_period(),
            send_timeout: config.send_timeout(),
        }
    }
}

/// Final result of one publish call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishOutcome {
    Sent {
        attempts: u32,
        #[serde(rename = "recordId")]
        record_id: String,
    },
    Exhausted {
        attempts: u32,
        #[serde(rename = "error")]
        last_error: String,
    },
    Cancelled { attempts: u32 },
}

impl PublishOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            PublishOutcome::Sent { attempts, .. }
            | PublishOutcome::Exhausted { attempts, .. }
            | PublishOutcome::Cancelled { attempts } => *attempts,
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, PublishOutcome::Sent { .. })
    }
}

/// Caller errors, raised before any attempt is made.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("channel must not be empty")]
    EmptyChannel,

    #[error("key must not be empty")]
    EmptyKey,
}

/// Terminal failure hook, invoked once per exhausted publish.
pub trait DeliveryReporter: Send + Sync {
    fn exhausted(&self, channel: &str, key: &str, attempts: u32, last_error: &SendError);
}

/// Logs exhausted deliveries.
pub struct LoggingReporter;

impl DeliveryReporter for LoggingReporter {
    fn exhausted(&self, channel: &str, key: &str, attempts: u32, last_error: &SendError) {
        tracing::error!(
            channel = %channel,
            key = %key,
            attempts,
            error = %last_error,
            "All retry attempts failed, message not delivered"
        );
    }
}

pub struct ReliablePublisher {
    sender: Arc<dyn MessageSender>,
    policy: RetryPolicy,
    reporter: Arc<dyn DeliveryReporter>,
}

impl ReliablePublisher {
    pub fn new(sender: Arc<dyn MessageSender>, policy: RetryPolicy) -> Self {
        Self::with_reporter(sender, policy, Arc::new(LoggingReporter))
    }

    pub fn with_reporter(
        sender: Arc<dyn MessageSender>,
        policy: RetryPolicy,
        reporter: Arc<dyn DeliveryReporter>,
    ) -> Self {
        Self {
            sender,
            policy: RetryPolicy {
                max_attempts: policy.max_attempts.max(1),
                ..policy
            },
            reporter,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn publish(
        &self,
        channel: &str,
        key: &str,
        payload: &str,
    ) -> Result<PublishOutcome, PublishError> {
        self.publish_with_cancel(channel, key, payload, &CancellationToken::new())
            .await
    }

    #[tracing::instrument(name = "publisher.publish", skip(self, payload, cancel))]
    pub async fn publish_with_cancel(
        &self,
        channel: &str,
        key: &str,
        payload: &str,
        cancel: &CancellationToken,
    ) -> Result<PublishOutcome, PublishError> {
        if channel.is_empty() {
            return Err(PublishError::EmptyChannel);
        }
        if key.is_empty() {
            return Err(PublishError::EmptyKey);
        }

        let max_attempts = self.policy.max_attempts;
        let mut last_error = None;

        for attempt_number in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Ok(self.cancelled(attempt_number - 1));
            }

            let attempt = PublishAttempt {
                channel,
                key,
                payload,
                attempt_number,
            };
            PublishMetrics::record_attempt();

            let result = match tokio::time::timeout(
                self.policy.send_timeout,
                self.sender.send(&attempt),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(SendError::Timeout(self.policy.send_timeout)),
            };

            match result {
                Ok(receipt) => {
                    tracing::info!(
                        attempt = attempt_number,
                        record_id = %receipt.record_id,
                        "Message sent on attempt #{}",
                        attempt_number
                    );
                    PublishMetrics::record_sent(attempt_number);
                    return Ok(PublishOutcome::Sent {
                        attempts: attempt_number,
                        record_id: receipt.record_id,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt_number,
                        max_attempts,
                        error = %e,
                        "Send attempt failed"
                    );
                    last_error = Some(e);
                }
            }

            if attempt_number < max_attempts {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Ok(self.cancelled(attempt_number)),
                    _ = tokio::time::sleep(self.policy.back_off_period) => {}
                }
            }
        }

        let last_error =
            last_error.unwrap_or_else(|| SendError::Broker("no attempt was made".to_string()));
        self.reporter
            .exhausted(channel, key, max_attempts, &last_error);
        PublishMetrics::record_exhausted(max_attempts);

        Ok(PublishOutcome::Exhausted {
            attempts: max_attempts,
            last_error: last_error.to_string(),
        })
    }

    fn cancelled(&self, attempts: u32) -> PublishOutcome {
        tracing::info!(attempts, "Publish cancelled before delivery");
        PublishMetrics::record_cancelled(attempts);
        PublishOutcome::Cancelled { attempts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::publish::sender::SendReceipt;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Fails the first `failures` attempts, then succeeds. Records when each
    /// attempt started.
    struct ScriptedSender {
        failures: u32,
        calls: AtomicU32,
        started_at: Mutex<Vec<Instant>>,
    }

    impl ScriptedSender {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicU32::new(0),
                started_at: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MessageSender for ScriptedSender {
        async fn send(&self, attempt: &PublishAttempt<'_>) -> Result<SendReceipt, SendError> {
            self.started_at.lock().unwrap().push(Instant::now());
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            assert_eq!(call, attempt.attempt_number);

            if call <= self.failures {
                Err(SendError::Broker(format!("failure {}", call)))
            } else {
                Ok(SendReceipt {
                    record_id: format!("1700000000000-{}", call),
                })
            }
        }
    }

    /// Never answers
    struct HangingSender;

    #[async_trait]
    impl MessageSender for HangingSender {
        async fn send(&self, _attempt: &PublishAttempt<'_>) -> Result<SendReceipt, SendError> {
            std::future::pending().await
        }
    }

    #[derive(Default)]
    struct CountingReporter {
        calls: AtomicU32,
        last_attempts: AtomicU32,
    }

    impl DeliveryReporter for CountingReporter {
        fn exhausted(&self, _channel: &str, _key: &str, attempts: u32, _last_error: &SendError) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.last_attempts.store(attempts, Ordering::SeqCst);
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            back_off_period: Duration::from_millis(1000),
            send_timeout: Duration::from_millis(5000),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_sender_exhausts() {
        let sender = ScriptedSender::new(u32::MAX);
        let reporter = Arc::new(CountingReporter::default());
        let publisher = ReliablePublisher::with_reporter(sender.clone(), policy(3), reporter.clone());

        let outcome = publisher.publish("events", "k1", "{}").await.unwrap();

        assert!(matches!(outcome, PublishOutcome::Exhausted { attempts: 3, .. }));
        assert_eq!(sender.calls(), 3);
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(reporter.last_attempts.load(Ordering::SeqCst), 3);

        let started = sender.started_at.lock().unwrap().clone();
        for pair in started.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_millis(1000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_failures() {
        let sender = ScriptedSender::new(2);
        let reporter = Arc::new(CountingReporter::default());
        let publisher = ReliablePublisher::with_reporter(sender.clone(), policy(5), reporter.clone());

        let outcome = publisher.publish("events", "k1", "{}").await.unwrap();

        assert_eq!(
            outcome,
            PublishOutcome::Sent {
                attempts: 3,
                record_id: "1700000000000-3".to_string()
            }
        );
        assert_eq!(sender.calls(), 3);
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success_has_no_delay() {
        let sender = ScriptedSender::new(0);
        let publisher = ReliablePublisher::new(sender.clone(), policy(3));
        let start = Instant::now();

        let outcome = publisher.publish("events", "k1", "{}").await.unwrap();

        assert_eq!(outcome.attempts(), 1);
        assert!(outcome.is_sent());
        assert_eq!(Instant::now() - start, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_policy() {
        let sender = ScriptedSender::new(u32::MAX);
        let reporter = Arc::new(CountingReporter::default());
        let publisher = ReliablePublisher::with_reporter(sender.clone(), policy(1), reporter.clone());

        let outcome = publisher.publish("events", "k1", "{}").await.unwrap();

        assert_eq!(outcome.attempts(), 1);
        assert_eq!(sender.calls(), 1);
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_clamped_to_one() {
        let sender = ScriptedSender::new(0);
        let publisher = ReliablePublisher::new(sender.clone(), policy(0));
        assert_eq!(publisher.policy().max_attempts, 1);

        let outcome = publisher.publish("events", "k1", "{}").await.unwrap();
        assert!(outcome.is_sent());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failed_attempt() {
        let reporter = Arc::new(CountingReporter::default());
        let publisher = ReliablePublisher::with_reporter(
            Arc::new(HangingSender),
            RetryPolicy {
                max_attempts: 2,
                back_off_period: Duration::from_millis(100),
                send_timeout: Duration::from_millis(50),
            },
            reporter.clone(),
        );

        let outcome = publisher.publish("events", "k1", "{}").await.unwrap();

        match outcome {
            PublishOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("timed out"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_back_off() {
        let sender = ScriptedSender::new(u32::MAX);
        let reporter = Arc::new(CountingReporter::default());
        let publisher = Arc::new(ReliablePublisher::with_reporter(
            sender.clone(),
            policy(5),
            reporter.clone(),
        ));
        let token = CancellationToken::new();

        let task = {
            let publisher = publisher.clone();
            let token = token.clone();
            tokio::spawn(async move {
                publisher
                    .publish_with_cancel("events", "k1", "{}", &token)
                    .await
            })
        };

        // First attempt fails immediately, second starts at t=1000ms
        tokio::time::sleep(Duration::from_millis(1500)).await;
        token.cancel();

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, PublishOutcome::Cancelled { attempts: 2 });
        assert_eq!(sender.calls(), 2);
        assert_eq!(reporter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let sender = ScriptedSender::new(0);
        let publisher = ReliablePublisher::new(sender.clone(), policy(3));
        let token = CancellationToken::new();
        token.cancel();

        let outcome = publisher
            .publish_with_cancel("events", "k1", "{}", &token)
            .await
            .unwrap();
        assert_eq!(outcome, PublishOutcome::Cancelled { attempts: 0 });
        assert_eq!(sender.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_channel_or_key_rejected() {
        let sender = ScriptedSender::new(0);
        let publisher = ReliablePublisher::new(sender.clone(), policy(3));

        assert_eq!(
            publisher.publish("", "k", "{}").await,
            Err(PublishError::EmptyChannel)
        );
        assert_eq!(
            publisher.publish("events", "", "{}").await,
            Err(PublishError::EmptyKey)
        );
        assert_eq!(sender.calls(), 0);
    }

    #[test]
    fn test_outcome_wire_format() {
        let sent = serde_json::to_value(PublishOutcome::Sent {
            attempts: 2,
            record_id: "1-0".to_string(),
        })
        .unwrap();
        assert_eq!(sent["status"], "sent");
        assert_eq!(sent["recordId"], "1-0");

        let exhausted = serde_json::to_value(PublishOutcome::Exhausted {
            attempts: 3,
            last_error: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(exhausted["status"], "exhausted");
        assert_eq!(exhausted["error"], "boom");
    }

    #[test]
    fn test_policy_from_config() {
        let config = PublisherConfig {
            max_attempts: 4,
            back_off_period_ms: 250,
            send_timeout_ms: 800,
            ..PublisherConfig::default()
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.back_off_period, Duration::from_millis(250));
        assert_eq!(policy.send_timeout, Duration::from_millis(800));
    }
}
