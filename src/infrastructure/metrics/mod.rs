//! Prometheus metrics for the localization service.
//!
//! - Resolution metrics (outcome, latency)
//! - Template registration metrics
//! - Publisher metrics (attempts, final outcomes)
//! - Consumer metrics
//! - Backend metrics (store latency/errors, Redis status, circuit breakers)

mod helpers;

pub use helpers::{
    encode_metrics, BackendMetrics, ConsumerMetrics, PublishMetrics, ResolutionMetrics,
    TemplateMetrics,
};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, register_int_gauge_vec, Histogram, HistogramVec, IntCounter, IntCounterVec,
    IntGauge, IntGaugeVec,
};

const METRIC_PREFIX: &str = "pigeon";

lazy_static! {
    // ============================================================================
    // Resolution Metrics
    // ============================================================================

    /// Resolutions by outcome (exact, fallback, miss)
    pub static ref RESOLUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_resolutions_total", METRIC_PREFIX),
        "Total message resolutions by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref RESOLUTION_LATENCY: Histogram = register_histogram!(
        format!("{}_resolution_latency_seconds", METRIC_PREFIX),
        "Message resolution latency in seconds",
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]
    ).unwrap();

    // ============================================================================
    // Template Metrics
    // ============================================================================

    /// Registrations by result (created, duplicate, rejected)
    pub static ref TEMPLATES_REGISTERED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_templates_registered_total", METRIC_PREFIX),
        "Total template registration requests by result",
        &["result"]
    ).unwrap();

    // ============================================================================
    // Publisher Metrics
    // ============================================================================

    pub static ref PUBLISH_ATTEMPTS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_publish_attempts_total", METRIC_PREFIX),
        "Total individual send attempts"
    ).unwrap();

    /// Final publish outcomes (sent, exhausted, cancelled)
    pub static ref PUBLISH_OUTCOMES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_publish_outcomes_total", METRIC_PREFIX),
        "Total publish operations by final outcome",
        &["outcome"]
    ).unwrap();

    /// Attempts needed per publish operation
    pub static ref PUBLISH_ATTEMPTS_PER_MESSAGE: Histogram = register_histogram!(
        format!("{}_publish_attempts_per_message", METRIC_PREFIX),
        "Distribution of attempts used per publish operation",
        vec![1.0, 2.0, 3.0, 5.0, 10.0]
    ).unwrap();

    // ============================================================================
    // Consumer Metrics
    // ============================================================================

    /// Resolve requests received over Pub/Sub (resolved, invalid, failed)
    pub static ref CONSUMER_MESSAGES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_consumer_messages_total", METRIC_PREFIX),
        "Total resolve requests consumed by result",
        &["result"]
    ).unwrap();

    pub static ref CONSUMER_IN_FLIGHT: IntGauge = register_int_gauge!(
        format!("{}_consumer_in_flight", METRIC_PREFIX),
        "Resolve requests currently being processed"
    ).unwrap();

    // ============================================================================
    // Backend Metrics
    // ============================================================================

    pub static ref STORE_OPERATION_LATENCY: HistogramVec = register_histogram_vec!(
        format!("{}_store_operation_latency_seconds", METRIC_PREFIX),
        "Template store operation latency in seconds",
        &["backend", "operation"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    ).unwrap();

    pub static ref STORE_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_store_errors_total", METRIC_PREFIX),
        "Total template store errors",
        &["backend", "operation"]
    ).unwrap();

    /// Redis connection status (1 = connected, 0 = disconnected)
    pub static ref REDIS_CONNECTION_STATUS: IntGauge = register_int_gauge!(
        format!("{}_redis_connection_status", METRIC_PREFIX),
        "Redis connection status (1=connected, 0=disconnected)"
    ).unwrap();

    /// Circuit breaker state per backend (0=closed, 1=open, 2=half-open)
    pub static ref CIRCUIT_BREAKER_STATE: IntGaugeVec = register_int_gauge_vec!(
        format!("{}_circuit_breaker_state", METRIC_PREFIX),
        "Circuit breaker state (0=closed, 1=open, 2=half-open)",
        &["backend"]
    ).unwrap();
}
