//! Domain layer modules
//!
//! - `localization`: Template store, locale fallback, formatting, resolution
//! - `publish`: Reliable event publishing with retry

pub mod localization;
pub mod publish;
