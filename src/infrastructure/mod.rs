//! Infrastructure layer modules
//!
//! This module contains shared infrastructure components:
//! - `config`: Application configuration and settings
//! - `error`: API error types and localized error responses
//! - `metrics`: Prometheus metrics helpers
//! - `postgres`: PostgreSQL connection pool
//! - `redis`: Redis connection pool, circuit breaker, and health checks

pub mod config;
pub mod error;
pub mod metrics;
pub mod postgres;
pub mod redis;
