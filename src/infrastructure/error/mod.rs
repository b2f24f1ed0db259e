//! API error types and their translation into localized responses.
//!
//! Every failure reaching the HTTP layer is an `AppError`. Its `ErrorKind`
//! decides status code and error code; the client-facing message is looked
//! up through the `MessageService` under a message key so deployments can
//! register localized error texts like any other template.

use std::sync::Arc;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::localization::{LocalizationError, MessageService, StoreError};
use crate::publish::PublishError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Template {template_id} already registered for locale {locale}")]
    Conflict { template_id: String, locale: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Template store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Publisher unavailable: {0}")]
    PublisherUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error categories with a fixed HTTP mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    StoreUnavailable,
    PublisherUnavailable,
    Internal,
}

impl ErrorKind {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::StoreUnavailable | ErrorKind::PublisherUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_FAILED",
            ErrorKind::Conflict => "DUPLICATE_TEMPLATE",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::StoreUnavailable => "STORE_UNAVAILABLE",
            ErrorKind::PublisherUnavailable => "PUBLISHER_UNAVAILABLE",
            ErrorKind::Internal => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Short category description sent as `details`
    pub fn details(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "Invalid input provided",
            ErrorKind::Conflict => "Resource already exists",
            ErrorKind::NotFound => "Resource not found",
            ErrorKind::StoreUnavailable => "Template store temporarily unavailable",
            ErrorKind::PublisherUnavailable => "Event publishing temporarily unavailable",
            ErrorKind::Internal => "An unexpected error occurred",
        }
    }

    /// Kinds whose raw message may leak backend internals
    fn masks_message(&self) -> bool {
        matches!(
            self,
            ErrorKind::StoreUnavailable | ErrorKind::PublisherUnavailable | ErrorKind::Internal
        )
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation { .. } => ErrorKind::Validation,
            AppError::Conflict { .. } => ErrorKind::Conflict,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            AppError::PublisherUnavailable(_) => ErrorKind::PublisherUnavailable,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        AppError::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Message key and positional arguments used to localize this error
    pub fn message_template(&self) -> (&'static str, Vec<Value>) {
        match self {
            AppError::Validation { field, reason } => {
                ("request.field.invalid", vec![json!(field), json!(reason)])
            }
            AppError::Conflict {
                template_id,
                locale,
            } => ("template.duplicate", vec![json!(template_id), json!(locale)]),
            AppError::NotFound(what) => ("resource.not.found", vec![json!(what)]),
            AppError::StoreUnavailable(_) => ("store.unavailable", vec![]),
            AppError::PublisherUnavailable(_) => ("publisher.unavailable", vec![]),
            AppError::Internal(_) => ("internal.error", vec![]),
        }
    }

    /// Built-in English text; backend details only when `expose_details`
    pub fn client_message(&self, expose_details: bool) -> String {
        let kind = self.kind();
        if kind.masks_message() && !expose_details {
            kind.details().to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<LocalizationError> for AppError {
    fn from(err: LocalizationError) -> Self {
        match err {
            LocalizationError::MalformedInput { field, reason } => {
                AppError::Validation { field, reason }
            }
            LocalizationError::Duplicate {
                template_id,
                locale,
            } => AppError::Conflict {
                template_id,
                locale,
            },
            LocalizationError::StoreUnavailable(StoreError::Serialization(e)) => {
                AppError::Internal(format!("corrupt template record: {}", e))
            }
            LocalizationError::StoreUnavailable(e) => AppError::StoreUnavailable(e.to_string()),
        }
    }
}

impl From<PublishError> for AppError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::EmptyChannel => AppError::validation("channel", "must not be empty"),
            PublishError::EmptyKey => AppError::validation("key", "must not be empty"),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation("body", rejection.body_text())
    }
}

/// Error body returned by every endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub error_code: &'static str,
    pub message: String,
    pub details: &'static str,
    pub path: String,
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Turns `AppError`s into localized `ErrorResponse`s.
pub struct ErrorTranslator {
    messages: Arc<MessageService>,
    expose_details: bool,
}

impl ErrorTranslator {
    pub fn new(messages: Arc<MessageService>, expose_details: bool) -> Self {
        Self {
            messages,
            expose_details,
        }
    }

    /// Localizes the message in the default locale when a template for the
    /// error's key exists; otherwise uses the built-in English text.
    pub async fn translate(&self, err: &AppError, path: &str) -> ErrorResponse {
        let kind = err.kind();
        let status = kind.status();

        tracing::error!(
            code = kind.code(),
            status = status.as_u16(),
            path = %path,
            error = %err,
            "API error"
        );

        let message = self.localized_message(err).await;

        ErrorResponse {
            timestamp: Utc::now(),
            status: status.as_u16(),
            error_code: kind.code(),
            message,
            details: kind.details(),
            path: path.to_string(),
        }
    }

    async fn localized_message(&self, err: &AppError) -> String {
        // Masked kinds never interpolate backend text into a template
        let (key, args) = if err.kind().masks_message() && !self.expose_details {
            (err.message_template().0, Vec::new())
        } else {
            err.message_template()
        };

        let locale = self.messages.default_locale().to_string();
        match self.messages.resolve_message(key, &locale, args).await {
            Ok(resolved) if resolved.matched_locale.is_some() => resolved.resolved_text,
            Ok(_) => err.client_message(self.expose_details),
            Err(e) => {
                tracing::warn!(key, error = %e, "Error message localization failed");
                err.client_message(self.expose_details)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::localization::{
        LocaleResolver, MemoryTemplateStore, RegisterTemplateRequest, TemplateStore,
    };

    fn translator(expose: bool) -> (ErrorTranslator, Arc<MessageService>) {
        let store: Arc<dyn TemplateStore> = Arc::new(MemoryTemplateStore::new());
        let service = Arc::new(MessageService::new(store, LocaleResolver::new("en")));
        (ErrorTranslator::new(service.clone(), expose), service)
    }

    async fn register(service: &MessageService, key: &str, message: &str) {
        service
            .register(RegisterTemplateRequest {
                template_id: Some(key.to_string()),
                locale: Some("en".to_string()),
                message: Some(message.to_string()),
                service_provider_id: Some("pigeon".to_string()),
                service_consumer_id: Some("pigeon".to_string()),
            })
            .await
            .unwrap();
    }

    #[test]
    fn test_kind_mapping_is_total() {
        let cases = [
            (AppError::validation("locale", "bad"), 400, "VALIDATION_FAILED"),
            (
                AppError::Conflict {
                    template_id: "t".into(),
                    locale: "en".into(),
                },
                409,
                "DUPLICATE_TEMPLATE",
            ),
            (AppError::NotFound("t".into()), 404, "NOT_FOUND"),
            (AppError::StoreUnavailable("x".into()), 503, "STORE_UNAVAILABLE"),
            (
                AppError::PublisherUnavailable("x".into()),
                503,
                "PUBLISHER_UNAVAILABLE",
            ),
            (AppError::Internal("x".into()), 500, "INTERNAL_SERVER_ERROR"),
        ];

        for (err, status, code) in cases {
            assert_eq!(err.kind().status().as_u16(), status);
            assert_eq!(err.kind().code(), code);
        }
    }

    #[test]
    fn test_internal_details_masked() {
        let err = AppError::StoreUnavailable("connection refused at 10.0.0.5".into());
        assert_eq!(
            err.client_message(false),
            "Template store temporarily unavailable"
        );
        assert!(err.client_message(true).contains("10.0.0.5"));

        let err = AppError::validation("locale", "must not be blank");
        assert_eq!(err.client_message(false), "Invalid locale: must not be blank");
    }

    #[test]
    fn test_localization_error_conversion() {
        let err = AppError::from(LocalizationError::malformed("templateId", "blank"));
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = AppError::from(LocalizationError::StoreUnavailable(StoreError::Unavailable(
            "down".into(),
        )));
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);

        let err = AppError::from(PublishError::EmptyKey);
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_translate_without_template_uses_builtin_text() {
        let (translator, _) = translator(false);

        let response = translator
            .translate(&AppError::NotFound("greeting".into()), "/api/v1/templates/greeting")
            .await;

        assert_eq!(response.status, 404);
        assert_eq!(response.error_code, "NOT_FOUND");
        assert_eq!(response.message, "Not found: greeting");
        assert_eq!(response.path, "/api/v1/templates/greeting");
    }

    #[tokio::test]
    async fn test_translate_uses_registered_template() {
        let (translator, service) = translator(false);
        register(&service, "template.duplicate", "Template {0} already exists for {1}").await;

        let err = AppError::Conflict {
            template_id: "greeting".into(),
            locale: "fr".into(),
        };
        let response = translator.translate(&err, "/api/v1/templates").await;

        assert_eq!(response.status, 409);
        assert_eq!(response.message, "Template greeting already exists for fr");
    }

    #[tokio::test]
    async fn test_masked_kind_ignores_backend_text() {
        let (translator, service) = translator(false);
        register(&service, "store.unavailable", "Storage is down {0}").await;

        let response = translator
            .translate(&AppError::StoreUnavailable("secret-host".into()), "/x")
            .await;

        assert_eq!(response.message, "Storage is down {0}");
        assert!(!response.message.contains("secret-host"));
    }

    #[test]
    fn test_error_response_wire_format() {
        let response = ErrorResponse {
            timestamp: Utc::now(),
            status: 400,
            error_code: "VALIDATION_FAILED",
            message: "Invalid locale".to_string(),
            details: "Invalid input provided",
            path: "/api/v1/templates".to_string(),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["errorCode"], "VALIDATION_FAILED");
        assert_eq!(value["status"], 400);
        assert!(value.get("timestamp").is_some());
    }
}
