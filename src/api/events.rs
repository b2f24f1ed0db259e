//! Manual publish endpoint.

use axum::{
    extract::{rejection::JsonRejection, OriginalUri, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::AppError;
use crate::publish::PublishOutcome;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct PublishEventRequest {
    pub channel: String,
    pub key: String,
    /// Strings are sent as-is, anything else as serialized JSON
    pub payload: Value,
}

/// POST /api/v1/events/publish - Publish a payload with retry
///
/// Waits for the final outcome: `200` when sent, `502` when every attempt
/// failed, `503` when shutdown interrupted the retries.
#[tracing::instrument(name = "http.publish_event", skip(state, payload))]
pub async fn publish_event(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    payload: Result<Json<PublishEventRequest>, JsonRejection>,
) -> Response {
    match publish(&state, payload).await {
        Ok(outcome) => {
            let status = match outcome {
                PublishOutcome::Sent { .. } => StatusCode::OK,
                PublishOutcome::Exhausted { .. } => StatusCode::BAD_GATEWAY,
                PublishOutcome::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
            };
            (status, Json(outcome)).into_response()
        }
        Err(e) => state.error_response(e, uri.path()).await,
    }
}

async fn publish(
    state: &AppState,
    payload: Result<Json<PublishEventRequest>, JsonRejection>,
) -> Result<PublishOutcome, AppError> {
    let Some(publisher) = state.publisher.as_ref() else {
        return Err(AppError::PublisherUnavailable(
            "publisher is disabled".to_string(),
        ));
    };

    let Json(request) = payload?;
    let body = match request.payload {
        Value::String(text) => text,
        other => other.to_string(),
    };

    let outcome = publisher
        .publish_with_cancel(&request.channel, &request.key, &body, &state.shutdown)
        .await?;
    Ok(outcome)
}
