//! Message resolution service
//!
//! Walks the locale fallback chain against the template store, formats the
//! first match and falls back to a deterministic not-found text when no
//! locale matched. Resolution never fails because a template is missing.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;

use crate::metrics::{BackendMetrics, ResolutionMetrics, TemplateMetrics};

use super::formatter::format_message;
use super::locale::LocaleResolver;
use super::store::TemplateStore;
use super::types::{
    require_template_id, validate_template_id, LocalizationError, RegisterTemplateRequest,
    ResolvedMessage, TemplateRecord,
};

/// Text returned when no locale in the chain has a template
pub fn not_found_message(template_id: &str, locale: &str) -> String {
    format!(
        "No message found under msgTemplateID [{}] for locale '{}'",
        template_id, locale
    )
}

pub struct MessageService {
    store: Arc<dyn TemplateStore>,
    resolver: LocaleResolver,
}

impl MessageService {
    pub fn new(store: Arc<dyn TemplateStore>, resolver: LocaleResolver) -> Self {
        Self { store, resolver }
    }

    pub fn default_locale(&self) -> &str {
        self.resolver.default_locale()
    }

    pub fn store_backend(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Resolved text only
    pub async fn resolve(
        &self,
        template_id: &str,
        locale: &str,
        args: &[Value],
    ) -> Result<String, LocalizationError> {
        let (text, _) = self.resolve_text(template_id, locale, args).await?;
        Ok(text)
    }

    /// Resolved text together with the locale that matched
    pub async fn resolve_message(
        &self,
        template_id: &str,
        locale: &str,
        args: Vec<Value>,
    ) -> Result<ResolvedMessage, LocalizationError> {
        let (resolved_text, matched_locale) =
            self.resolve_text(template_id, locale, &args).await?;

        Ok(ResolvedMessage {
            template_id: template_id.to_string(),
            locale: locale.to_string(),
            matched_locale,
            args,
            resolved_text,
            timestamp: Utc::now(),
        })
    }

    async fn resolve_text(
        &self,
        template_id: &str,
        locale: &str,
        args: &[Value],
    ) -> Result<(String, Option<String>), LocalizationError> {
        require_template_id(template_id)?;
        let started = Instant::now();

        for candidate in self.resolver.fallback_chain(locale) {
            let Some(record) = self.lookup(template_id, candidate).await? else {
                continue;
            };

            let elapsed = started.elapsed().as_secs_f64();
            if candidate == locale {
                ResolutionMetrics::record_exact(elapsed);
            } else {
                ResolutionMetrics::record_fallback(elapsed);
            }

            tracing::debug!(
                template_id = %template_id,
                locale = %locale,
                matched_locale = %candidate,
                "Template resolved"
            );

            let text = format_message(&record.message, args, self.resolver.format_locale(locale));
            return Ok((text, Some(record.locale)));
        }

        ResolutionMetrics::record_miss(started.elapsed().as_secs_f64());
        tracing::warn!(
            template_id = %template_id,
            locale = %locale,
            "No template found in any fallback locale"
        );

        // The fallback text goes through the formatter without arguments
        let text = format_message(
            &not_found_message(template_id, locale),
            &[],
            self.resolver.format_locale(locale),
        );
        Ok((text, None))
    }

    async fn lookup(
        &self,
        template_id: &str,
        locale: &str,
    ) -> Result<Option<TemplateRecord>, LocalizationError> {
        let backend = self.store.backend_name();
        let started = Instant::now();

        let result = self.store.lookup(template_id, locale).await;
        BackendMetrics::record_latency(backend, "lookup", started.elapsed().as_secs_f64());

        result.map_err(|e| {
            BackendMetrics::record_error(backend, "lookup");
            tracing::error!(
                backend,
                template_id = %template_id,
                locale = %locale,
                error = %e,
                "Template lookup failed"
            );
            LocalizationError::from(e)
        })
    }

    /// Validates and stores a new template variant
    pub async fn register(
        &self,
        request: RegisterTemplateRequest,
    ) -> Result<TemplateRecord, LocalizationError> {
        let record = match request.into_record() {
            Ok(record) => record,
            Err(e) => {
                TemplateMetrics::record_rejected();
                return Err(e);
            }
        };

        let backend = self.store.backend_name();
        let started = Instant::now();
        let result = self.store.insert(record).await;
        BackendMetrics::record_latency(backend, "insert", started.elapsed().as_secs_f64());

        match result.map_err(LocalizationError::from) {
            Ok(record) => {
                TemplateMetrics::record_created();
                tracing::info!(
                    template_id = %record.template_id,
                    locale = %record.locale,
                    "Template registered"
                );
                Ok(record)
            }
            Err(LocalizationError::Duplicate {
                template_id,
                locale,
            }) => {
                TemplateMetrics::record_duplicate();
                tracing::warn!(
                    template_id = %template_id,
                    locale = %locale,
                    "Duplicate template registration rejected"
                );
                Err(LocalizationError::Duplicate {
                    template_id,
                    locale,
                })
            }
            Err(e) => {
                BackendMetrics::record_error(backend, "insert");
                tracing::error!(backend, error = %e, "Template registration failed");
                Err(e)
            }
        }
    }

    /// Every registered locale variant of a template
    pub async fn templates(
        &self,
        template_id: &str,
    ) -> Result<Vec<TemplateRecord>, LocalizationError> {
        validate_template_id(template_id)?;

        let backend = self.store.backend_name();
        self.store.list(template_id).await.map_err(|e| {
            BackendMetrics::record_error(backend, "list");
            tracing::error!(backend, template_id = %template_id, error = %e, "Template listing failed");
            LocalizationError::from(e)
        })
    }
}
