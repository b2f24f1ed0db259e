//! Localized message templates.
//!
//! This module provides:
//! - Template records keyed by `(templateID, locale)` with memory, Redis and
//!   PostgreSQL stores
//! - Locale fallback chains (exact tag, base language, default locale)
//! - Positional `{n}` formatting with locale number and date conventions
//! - `MessageService`, which resolves a template for a locale and never fails
//!   because a template is missing
//!
//! # Example
//!
//! ```ignore
//! let service = MessageService::new(store, LocaleResolver::new("en"));
//!
//! // "en-US" falls back to the "en" variant
//! let text = service
//!     .resolve("staff.not.found.by.user.id", "en-US", &[json!("42")])
//!     .await?;
//! assert_eq!(text, "No staff found for user 42");
//! ```

mod factory;
mod formatter;
mod locale;
mod postgres_store;
mod redis_store;
mod service;
mod store;
mod types;

pub use factory::create_template_store;
pub use formatter::format_message;
pub use locale::{base_language, FallbackChain, LocaleResolver};
pub use postgres_store::PostgresTemplateStore;
pub use redis_store::RedisTemplateStore;
pub use service::{not_found_message, MessageService};
pub use store::{MemoryTemplateStore, TemplateStore};
pub use types::{
    LocalizationError, RegisterTemplateRequest, ResolvedMessage, StoreError, TemplateRecord,
    MAX_LOCALE_LEN, MAX_TEMPLATE_ID_LEN,
};
