//! Message resolution endpoints.

use axum::{
    extract::{rejection::JsonRejection, OriginalUri, Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;
use crate::localization::ResolvedMessage;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    #[serde(alias = "messageTemplateID")]
    pub template_id: String,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub args: Vec<Value>,
    /// Also emit the resolved message through the reliable publisher
    #[serde(default)]
    pub publish: Option<PublishTarget>,
}

#[derive(Debug, Deserialize)]
pub struct PublishTarget {
    /// Defaults to `publisher.default_channel`
    #[serde(default)]
    pub channel: Option<String>,
    pub key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    #[serde(flatten)]
    pub message: ResolvedMessage,
    pub publish_scheduled: bool,
}

#[derive(Debug, Deserialize)]
pub struct LocaleQuery {
    pub locale: Option<String>,
}

/// POST /api/v1/messages/resolve - Resolve a template with arguments
#[tracing::instrument(name = "http.resolve_message", skip(state, payload))]
pub async fn resolve_message(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    payload: Result<Json<ResolveRequest>, JsonRejection>,
) -> Response {
    match resolve_and_schedule(&state, payload).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => state.error_response(e, uri.path()).await,
    }
}

async fn resolve_and_schedule(
    state: &AppState,
    payload: Result<Json<ResolveRequest>, JsonRejection>,
) -> Result<ResolveResponse, AppError> {
    let Json(request) = payload?;

    let target = match request.publish {
        Some(target) => {
            let channel = target
                .channel
                .unwrap_or_else(|| state.settings.publisher.default_channel.clone());
            if channel.is_empty() {
                return Err(AppError::validation("publish.channel", "must not be empty"));
            }
            if target.key.is_empty() {
                return Err(AppError::validation("publish.key", "must not be empty"));
            }
            Some((channel, target.key))
        }
        None => None,
    };

    let locale = request.locale.unwrap_or_default();
    let message = state
        .message_service
        .resolve_message(&request.template_id, &locale, request.args)
        .await?;

    let publish_scheduled = match target {
        Some((channel, key)) => schedule_publish(state, channel, key, &message),
        None => false,
    };

    Ok(ResolveResponse {
        message,
        publish_scheduled,
    })
}

/// Spawns the publish so delivery never delays or fails the response.
fn schedule_publish(
    state: &AppState,
    channel: String,
    key: String,
    message: &ResolvedMessage,
) -> bool {
    let Some(publisher) = state.publisher.clone() else {
        tracing::warn!(channel = %channel, "Publish requested but publisher is disabled");
        return false;
    };

    let payload = match serde_json::to_string(message) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize resolved message");
            return false;
        }
    };

    let cancel = state.shutdown.child_token();
    tokio::spawn(async move {
        match publisher
            .publish_with_cancel(&channel, &key, &payload, &cancel)
            .await
        {
            Ok(outcome) if outcome.is_sent() => {}
            Ok(outcome) => tracing::warn!(
                channel = %channel,
                key = %key,
                attempts = outcome.attempts(),
                "Resolved message was not delivered"
            ),
            Err(e) => tracing::error!(channel = %channel, error = %e, "Publish rejected"),
        }
    });

    true
}

/// GET /api/v1/messages/{templateId}?locale=xx - Resolve without arguments
#[tracing::instrument(name = "http.get_message", skip(state))]
pub async fn get_message(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(template_id): Path<String>,
    Query(query): Query<LocaleQuery>,
) -> Response {
    let locale = query.locale.unwrap_or_default();
    match state
        .message_service
        .resolve_message(&template_id, &locale, Vec::new())
        .await
    {
        Ok(message) => Json(message).into_response(),
        Err(e) => state.error_response(e.into(), uri.path()).await,
    }
}
