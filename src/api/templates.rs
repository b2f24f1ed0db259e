//! Template registration and listing endpoints.

use axum::{
    extract::{rejection::JsonRejection, OriginalUri, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::AppError;
use crate::localization::{RegisterTemplateRequest, TemplateRecord};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct TemplateListResponse {
    pub templates: Vec<TemplateRecord>,
    pub total: usize,
}

/// POST /api/v1/templates - Register a template variant
#[tracing::instrument(name = "http.register_template", skip(state, payload))]
pub async fn register_template(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    payload: Result<Json<RegisterTemplateRequest>, JsonRejection>,
) -> Response {
    let result = async {
        let Json(request) = payload?;
        let record = state.message_service.register(request).await?;
        Ok::<_, AppError>(record)
    }
    .await;

    match result {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => state.error_response(e, uri.path()).await,
    }
}

/// GET /api/v1/templates/{templateId} - All locale variants of a template
#[tracing::instrument(name = "http.list_templates", skip(state))]
pub async fn list_templates(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Path(template_id): Path<String>,
) -> Response {
    let result = match state.message_service.templates(&template_id).await {
        Ok(templates) if templates.is_empty() => {
            Err(AppError::NotFound(format!("template {}", template_id)))
        }
        Ok(templates) => Ok(templates),
        Err(e) => Err(AppError::from(e)),
    };

    match result {
        Ok(templates) => {
            let total = templates.len();
            Json(TemplateListResponse { templates, total }).into_response()
        }
        Err(e) => state.error_response(e, uri.path()).await,
    }
}
