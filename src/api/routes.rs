use axum::{
    routing::{get, post},
    Router,
};

use super::events::publish_event;
use super::health::health;
use super::messages::{get_message, resolve_message};
use super::metrics::prometheus_metrics;
use super::templates::{list_templates, register_template};
use crate::server::AppState;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .nest(
            "/api/v1",
            Router::new()
                // Templates
                .route("/templates", post(register_template))
                .route("/templates/{template_id}", get(list_templates))
                // Resolution
                .route("/messages/resolve", post(resolve_message))
                .route("/messages/{template_id}", get(get_message))
                // Publishing
                .route("/events/publish", post(publish_event)),
        )
}
