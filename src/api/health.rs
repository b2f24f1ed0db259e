//! Health check endpoint.

use std::time::Duration;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::redis::RedisHealthStatus;
use crate::server::AppState;

const PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub store: StoreHealthResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisHealthResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresHealthResponse>,
    pub publisher: PublisherHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct StoreHealthResponse {
    pub backend: String,
    pub default_locale: String,
}

#[derive(Debug, Serialize)]
pub struct RedisHealthResponse {
    pub status: String,
    pub connected: bool,
    pub circuit_breaker_state: String,
    pub reconnection_attempts: u32,
}

#[derive(Debug, Serialize)]
pub struct PostgresHealthResponse {
    pub connected: bool,
    pub pool_size: u32,
    pub idle_connections: u32,
}

#[derive(Debug, Serialize)]
pub struct PublisherHealthResponse {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut healthy = true;

    let redis = match state.redis_pool.as_ref() {
        Some(pool) => {
            // Ping so a lazily connected pool reports its real state
            match tokio::time::timeout(PING_TIMEOUT, pool.ping()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Redis health ping failed"),
                Err(_) => tracing::warn!("Redis health ping timed out"),
            }
            let stats = pool.health().stats();
            let connected = stats.status == RedisHealthStatus::Healthy;
            healthy &= connected;
            Some(RedisHealthResponse {
                status: stats.status.as_str().to_string(),
                connected,
                circuit_breaker_state: pool.circuit_state().as_str().to_string(),
                reconnection_attempts: stats.reconnection_attempts,
            })
        }
        None => None,
    };

    let postgres = state.postgres_pool.as_ref().map(|pool| {
        let inner_pool = pool.pool();
        let connected = pool.is_available() && !inner_pool.is_closed();
        healthy &= connected;
        PostgresHealthResponse {
            connected,
            pool_size: inner_pool.size(),
            idle_connections: inner_pool.num_idle() as u32,
        }
    });

    let status = if healthy { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        store: StoreHealthResponse {
            backend: state.message_service.store_backend().to_string(),
            default_locale: state.message_service.default_locale().to_string(),
        },
        redis,
        postgres,
        publisher: PublisherHealthResponse {
            enabled: state.publisher.is_some(),
            max_attempts: state.publisher.as_ref().map(|p| p.policy().max_attempts),
        },
    })
}
