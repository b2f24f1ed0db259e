//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use crate::redis::CircuitState;

use super::{
    CIRCUIT_BREAKER_STATE, CONSUMER_IN_FLIGHT, CONSUMER_MESSAGES_TOTAL, PUBLISH_ATTEMPTS_PER_MESSAGE,
    PUBLISH_ATTEMPTS_TOTAL, PUBLISH_OUTCOMES_TOTAL, REDIS_CONNECTION_STATUS, RESOLUTIONS_TOTAL,
    RESOLUTION_LATENCY, STORE_ERRORS_TOTAL, STORE_OPERATION_LATENCY, TEMPLATES_REGISTERED_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

pub struct ResolutionMetrics;

impl ResolutionMetrics {
    pub fn record_exact(latency_secs: f64) {
        Self::record("exact", latency_secs);
    }

    pub fn record_fallback(latency_secs: f64) {
        Self::record("fallback", latency_secs);
    }

    /// No candidate locale matched; the not-found text was returned
    pub fn record_miss(latency_secs: f64) {
        Self::record("miss", latency_secs);
    }

    fn record(outcome: &str, latency_secs: f64) {
        RESOLUTIONS_TOTAL.with_label_values(&[outcome]).inc();
        RESOLUTION_LATENCY.observe(latency_secs);
    }
}

pub struct TemplateMetrics;

impl TemplateMetrics {
    pub fn record_created() {
        TEMPLATES_REGISTERED_TOTAL.with_label_values(&["created"]).inc();
    }

    pub fn record_duplicate() {
        TEMPLATES_REGISTERED_TOTAL.with_label_values(&["duplicate"]).inc();
    }

    pub fn record_rejected() {
        TEMPLATES_REGISTERED_TOTAL.with_label_values(&["rejected"]).inc();
    }
}

pub struct PublishMetrics;

impl PublishMetrics {
    pub fn record_attempt() {
        PUBLISH_ATTEMPTS_TOTAL.inc();
    }

    pub fn record_sent(attempts: u32) {
        Self::record_outcome("sent", attempts);
    }

    pub fn record_exhausted(attempts: u32) {
        Self::record_outcome("exhausted", attempts);
    }

    pub fn record_cancelled(attempts: u32) {
        Self::record_outcome("cancelled", attempts);
    }

    fn record_outcome(outcome: &str, attempts: u32) {
        PUBLISH_OUTCOMES_TOTAL.with_label_values(&[outcome]).inc();
        PUBLISH_ATTEMPTS_PER_MESSAGE.observe(attempts as f64);
    }
}

pub struct ConsumerMetrics;

impl ConsumerMetrics {
    pub fn record_resolved() {
        CONSUMER_MESSAGES_TOTAL.with_label_values(&["resolved"]).inc();
    }

    /// Payload could not be parsed
    pub fn record_invalid() {
        CONSUMER_MESSAGES_TOTAL.with_label_values(&["invalid"]).inc();
    }

    pub fn record_failed() {
        CONSUMER_MESSAGES_TOTAL.with_label_values(&["failed"]).inc();
    }

    pub fn inc_in_flight() {
        CONSUMER_IN_FLIGHT.inc();
    }

    pub fn dec_in_flight() {
        CONSUMER_IN_FLIGHT.dec();
    }
}

pub struct BackendMetrics;

impl BackendMetrics {
    pub fn record_latency(backend: &str, operation: &str, latency_secs: f64) {
        STORE_OPERATION_LATENCY
            .with_label_values(&[backend, operation])
            .observe(latency_secs);
    }

    pub fn record_error(backend: &str, operation: &str) {
        STORE_ERRORS_TOTAL
            .with_label_values(&[backend, operation])
            .inc();
    }

    pub fn set_redis_connected(connected: bool) {
        REDIS_CONNECTION_STATUS.set(if connected { 1 } else { 0 });
    }

    pub fn set_circuit_state(backend: &str, state: CircuitState) {
        CIRCUIT_BREAKER_STATE
            .with_label_values(&[backend])
            .set(state as i64);
    }
}
