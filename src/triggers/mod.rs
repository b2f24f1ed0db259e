mod redis;

pub use redis::{ConsumeResult, ResolveEvent, ResolveRequestConsumer};
