//! Shared multiplexed Redis connection used by the template store and the
//! stream sender.

use std::sync::Arc;

use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError, RedisResult};
use tokio::sync::RwLock;

use crate::config::RedisConfig;

use super::{CircuitBreaker, CircuitState, RedisHealth};

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Circuit breaker is open")]
    CircuitOpen,
}

impl PoolError {
    /// True when the backend could not be reached at all
    pub fn is_unavailable(&self) -> bool {
        match self {
            PoolError::CircuitOpen => true,
            PoolError::Redis(e) => {
                e.is_connection_dropped() || e.is_io_error() || e.is_connection_refusal() || e.is_timeout()
            }
        }
    }
}

pub struct RedisPool {
    client: Client,
    connection: RwLock<Option<MultiplexedConnection>>,
    circuit_breaker: Arc<CircuitBreaker>,
    health: Arc<RedisHealth>,
    url: String,
}

impl RedisPool {
    /// Creates the pool without connecting; the first command connects lazily.
    pub fn new(
        config: &RedisConfig,
        circuit_breaker: Arc<CircuitBreaker>,
        health: Arc<RedisHealth>,
    ) -> Result<Self, PoolError> {
        let client = Client::open(config.url.as_str())?;

        Ok(Self {
            client,
            connection: RwLock::new(None),
            circuit_breaker,
            health,
            url: config.url.clone(),
        })
    }

    /// Client handle for dedicated connections (Pub/Sub)
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn health(&self) -> &Arc<RedisHealth> {
        &self.health
    }

    async fn get_connection(&self) -> Result<MultiplexedConnection, PoolError> {
        if !self.circuit_breaker.allow_request() {
            self.health.set_circuit_open();
            return Err(PoolError::CircuitOpen);
        }

        {
            let conn = self.connection.read().await;
            if let Some(ref c) = *conn {
                return Ok(c.clone());
            }
        }

        self.connect().await
    }

    async fn connect(&self) -> Result<MultiplexedConnection, PoolError> {
        let mut guard = self.connection.write().await;

        // Another task may have connected while we waited for the lock
        if let Some(ref c) = *guard {
            return Ok(c.clone());
        }

        self.health.set_reconnecting();

        match self.client.get_multiplexed_tokio_connection().await {
            Ok(conn) => {
                *guard = Some(conn.clone());
                self.circuit_breaker.record_success();
                self.health.set_connected();
                tracing::info!("Redis pool connection established");
                Ok(conn)
            }
            Err(e) => {
                self.circuit_breaker.record_failure();
                tracing::error!(error = %e, "Failed to connect to Redis");
                Err(PoolError::Redis(e))
            }
        }
    }

    /// Runs one command on the shared connection, feeding the circuit breaker
    /// and dropping the connection when it broke.
    pub async fn execute<F, T, Fut>(&self, f: F) -> Result<T, PoolError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: std::future::Future<Output = RedisResult<T>>,
    {
        let conn = self.get_connection().await?;

        match f(conn).await {
            Ok(result) => {
                self.circuit_breaker.record_success();
                Ok(result)
            }
            Err(e) => {
                if e.is_connection_dropped() || e.is_io_error() {
                    *self.connection.write().await = None;
                    self.health.set_reconnecting();
                }
                self.circuit_breaker.record_failure();
                Err(PoolError::Redis(e))
            }
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.health.is_healthy() && self.circuit_breaker.state() == CircuitState::Closed
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn ping(&self) -> Result<(), PoolError> {
        self.execute(|mut conn| async move {
            redis::cmd("PING").query_async::<String>(&mut conn).await
        })
        .await
        .map(|_| ())
    }
}

/// Typed commands used by the template store and the stream sender.
#[async_trait::async_trait]
pub trait RedisPoolExt {
    /// XADD with approximate MAXLEN trimming; returns the entry id.
    async fn xadd_maxlen(
        &self,
        stream: &str,
        maxlen: usize,
        fields: &[(&str, &str)],
    ) -> Result<String, PoolError>;

    /// HSETNX; returns false when the field already existed.
    async fn hset_nx(&self, key: &str, field: &str, value: &str) -> Result<bool, PoolError>;

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, PoolError>;

    async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>, PoolError>;
}

#[async_trait::async_trait]
impl RedisPoolExt for RedisPool {
    async fn xadd_maxlen(
        &self,
        stream: &str,
        maxlen: usize,
        fields: &[(&str, &str)],
    ) -> Result<String, PoolError> {
        // XADD stream MAXLEN ~ maxlen * field value ...
        let mut cmd = redis::cmd("XADD");
        cmd.arg(stream).arg("MAXLEN").arg("~").arg(maxlen).arg("*");
        for (field, value) in fields {
            cmd.arg(*field).arg(*value);
        }

        self.execute(|mut conn| async move { cmd.query_async::<String>(&mut conn).await })
            .await
    }

    async fn hset_nx(&self, key: &str, field: &str, value: &str) -> Result<bool, PoolError> {
        self.execute(|mut conn| async move { conn.hset_nx(key, field, value).await })
            .await
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, PoolError> {
        self.execute(|mut conn| async move { conn.hget(key, field).await })
            .await
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>, PoolError> {
        self.execute(|mut conn| async move { conn.hgetall(key).await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool(cb: Arc<CircuitBreaker>) -> RedisPool {
        let config = RedisConfig {
            url: "redis://localhost:6379".to_string(),
            ..RedisConfig::default()
        };
        RedisPool::new(&config, cb, Arc::new(RedisHealth::new())).unwrap()
    }

    #[test]
    fn test_pool_creation_is_lazy() {
        let pool = test_pool(Arc::new(CircuitBreaker::new("redis")));
        assert_eq!(pool.url(), "redis://localhost:6379");
        assert_eq!(pool.circuit_state(), CircuitState::Closed);
        assert!(!pool.is_healthy());
    }

    #[test]
    fn test_invalid_url_rejected() {
        let config = RedisConfig {
            url: "not a url".to_string(),
            ..RedisConfig::default()
        };
        let result = RedisPool::new(
            &config,
            Arc::new(CircuitBreaker::new("redis")),
            Arc::new(RedisHealth::new()),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_open_circuit_short_circuits_commands() {
        let cb = Arc::new(CircuitBreaker::new("redis"));
        let pool = test_pool(cb.clone());
        for _ in 0..5 {
            cb.record_failure();
        }

        let err = pool.hget("k", "f").await.unwrap_err();
        assert!(matches!(err, PoolError::CircuitOpen));
        assert!(err.is_unavailable());
        assert_eq!(
            pool.health().status(),
            super::super::RedisHealthStatus::CircuitOpen
        );
    }
}
