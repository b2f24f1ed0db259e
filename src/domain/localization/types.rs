//! Localization types and error definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::postgres::PostgresPoolError;
use crate::redis::PoolError;

/// Maximum template identifier length
pub const MAX_TEMPLATE_ID_LEN: usize = 256;

/// Maximum locale tag length
pub const MAX_LOCALE_LEN: usize = 35;

/// Errors raised by a template store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Template {template_id} already registered for locale {locale}")]
    Duplicate { template_id: String, locale: String },

    #[error("Redis error: {0}")]
    Redis(PoolError),

    #[error("PostgreSQL error: {0}")]
    Postgres(PostgresPoolError),

    /// A stored record could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend refused the request (circuit breaker open, connection lost)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<PoolError> for StoreError {
    fn from(err: PoolError) -> Self {
        if err.is_unavailable() {
            StoreError::Unavailable(err.to_string())
        } else {
            StoreError::Redis(err)
        }
    }
}

impl From<PostgresPoolError> for StoreError {
    fn from(err: PostgresPoolError) -> Self {
        if err.is_unavailable() {
            StoreError::Unavailable(err.to_string())
        } else {
            StoreError::Postgres(err)
        }
    }
}

/// Errors surfaced by the resolution service.
#[derive(Debug, Error)]
pub enum LocalizationError {
    #[error("Invalid {field}: {reason}")]
    MalformedInput { field: &'static str, reason: String },

    #[error("Template {template_id} already registered for locale {locale}")]
    Duplicate { template_id: String, locale: String },

    #[error("Template store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
}

impl LocalizationError {
    pub fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        LocalizationError::MalformedInput {
            field,
            reason: reason.into(),
        }
    }
}

impl From<StoreError> for LocalizationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate {
                template_id,
                locale,
            } => LocalizationError::Duplicate {
                template_id,
                locale,
            },
            other => LocalizationError::StoreUnavailable(other),
        }
    }
}

/// One locale variant of a message template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRecord {
    pub id: Uuid,

    #[serde(rename = "messageTemplateID")]
    pub template_id: String,

    pub locale: String,

    /// Raw template text with positional `{n}` placeholders
    pub message: String,

    #[serde(rename = "serviceProviderID")]
    pub service_provider_id: String,

    #[serde(rename = "serviceConsumerID")]
    pub service_consumer_id: String,

    pub created_at: DateTime<Utc>,
}

/// Registration payload. Fields are optional at the wire level so that a
/// missing field is reported as a validation failure naming it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterTemplateRequest {
    #[serde(rename = "messageTemplateID", alias = "templateId")]
    pub template_id: Option<String>,

    pub locale: Option<String>,

    pub message: Option<String>,

    #[serde(rename = "serviceProviderID")]
    pub service_provider_id: Option<String>,

    #[serde(rename = "serviceConsumerID")]
    pub service_consumer_id: Option<String>,
}

impl RegisterTemplateRequest {
    /// Validates every field and builds the record to insert, assigning a
    /// fresh id and creation time.
    pub fn into_record(self) -> Result<TemplateRecord, LocalizationError> {
        let template_id = required("messageTemplateID", self.template_id)?;
        validate_template_id(&template_id)?;

        let locale = required("locale", self.locale)?;
        validate_locale(&locale)?;

        let message = required("message", self.message)?;
        let service_provider_id = required("serviceProviderID", self.service_provider_id)?;
        let service_consumer_id = required("serviceConsumerID", self.service_consumer_id)?;

        Ok(TemplateRecord {
            id: Uuid::new_v4(),
            template_id,
            locale,
            message,
            service_provider_id,
            service_consumer_id,
            created_at: Utc::now(),
        })
    }
}

fn required(field: &'static str, value: Option<String>) -> Result<String, LocalizationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(LocalizationError::malformed(field, "must not be blank")),
    }
}

/// Only a blank id is malformed on the read path; unknown ids of any length
/// resolve to the not-found text.
pub(crate) fn require_template_id(template_id: &str) -> Result<(), LocalizationError> {
    if template_id.trim().is_empty() {
        return Err(LocalizationError::malformed(
            "templateId",
            "must not be blank",
        ));
    }
    Ok(())
}

/// Registration and listing also bound the length.
pub(crate) fn validate_template_id(template_id: &str) -> Result<(), LocalizationError> {
    require_template_id(template_id)?;
    if template_id.chars().count() > MAX_TEMPLATE_ID_LEN {
        return Err(LocalizationError::malformed(
            "templateId",
            format!("must be at most {} characters", MAX_TEMPLATE_ID_LEN),
        ));
    }
    Ok(())
}

fn validate_locale(locale: &str) -> Result<(), LocalizationError> {
    if locale.len() > MAX_LOCALE_LEN {
        return Err(LocalizationError::malformed(
            "locale",
            format!("must be at most {} characters", MAX_LOCALE_LEN),
        ));
    }
    if !locale
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(LocalizationError::malformed(
            "locale",
            "must contain only ASCII letters, digits, '-' or '_'",
        ));
    }
    Ok(())
}

/// Result of resolving a template for a locale.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedMessage {
    pub template_id: String,

    /// Locale as requested by the caller
    pub locale: String,

    /// Locale of the record that matched, absent when none did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_locale: Option<String>,

    pub args: Vec<serde_json::Value>,

    pub resolved_text: String,

    pub timestamp: DateTime<Utc>,
}
