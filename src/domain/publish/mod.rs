//! Reliable event publishing.
//!
//! - `MessageSender`: one acknowledged send attempt (Redis Streams in production)
//! - `ReliablePublisher`: bounded fixed-delay retry around a sender, with
//!   cancellation between attempts and a terminal failure hook

mod publisher;
mod sender;

pub use publisher::{
    DeliveryReporter, LoggingReporter, PublishError, PublishOutcome, ReliablePublisher,
    RetryPolicy,
};
pub use sender::{MessageSender, PublishAttempt, RedisStreamSender, SendError, SendReceipt};
