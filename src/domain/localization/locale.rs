//! Locale fallback chain computation

use smallvec::SmallVec;

/// Ordered, deduplicated lookup candidates for one request.
pub type FallbackChain<'a> = SmallVec<[&'a str; 3]>;

/// Computes the locales to try for a requested tag: the tag itself, its
/// base language, then the configured default.
#[derive(Debug, Clone)]
pub struct LocaleResolver {
    default_locale: String,
}

impl LocaleResolver {
    pub fn new(default_locale: impl Into<String>) -> Self {
        Self {
            default_locale: default_locale.into(),
        }
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// `en-US` with default `fr` yields `[en-US, en, fr]`. A blank request
    /// yields `[default]`.
    pub fn fallback_chain<'a>(&'a self, requested: &'a str) -> FallbackChain<'a> {
        let mut chain = FallbackChain::new();

        if !requested.trim().is_empty() {
            chain.push(requested);

            let base = base_language(requested);
            if !base.is_empty() && !chain.contains(&base) {
                chain.push(base);
            }
        }

        let default = self.default_locale.as_str();
        if !default.is_empty() && !chain.contains(&default) {
            chain.push(default);
        }

        chain
    }

    /// Locale whose number and date conventions apply to formatting
    pub fn format_locale<'a>(&'a self, requested: &'a str) -> &'a str {
        if requested.trim().is_empty() {
            &self.default_locale
        } else {
            requested
        }
    }
}

/// Primary language subtag; subtags are separated by `-` or `_`.
pub fn base_language(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(default: &str, requested: &str) -> Vec<String> {
        LocaleResolver::new(default)
            .fallback_chain(requested)
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_full_chain() {
        assert_eq!(chain("fr", "en-US"), vec!["en-US", "en", "fr"]);
    }

    #[test]
    fn test_base_equals_default() {
        assert_eq!(chain("en", "en-US"), vec!["en-US", "en"]);
    }

    #[test]
    fn test_exact_equals_default() {
        assert_eq!(chain("en", "en"), vec!["en"]);
    }

    #[test]
    fn test_underscore_separator() {
        assert_eq!(chain("en", "pt_BR"), vec!["pt_BR", "pt", "en"]);
        assert_eq!(chain("en", "zh_Hant_TW"), vec!["zh_Hant_TW", "zh", "en"]);
    }

    #[test]
    fn test_blank_request_uses_default_only() {
        assert_eq!(chain("en", ""), vec!["en"]);
        assert_eq!(chain("en", "  "), vec!["en"]);
    }

    #[test]
    fn test_leading_separator_has_no_base() {
        assert_eq!(chain("en", "-x"), vec!["-x", "en"]);
    }

    #[test]
    fn test_chain_is_pure() {
        let resolver = LocaleResolver::new("de");
        assert_eq!(
            resolver.fallback_chain("de-AT"),
            resolver.fallback_chain("de-AT")
        );
    }

    #[test]
    fn test_format_locale() {
        let resolver = LocaleResolver::new("de");
        assert_eq!(resolver.format_locale("fr-CA"), "fr-CA");
        assert_eq!(resolver.format_locale(""), "de");
    }

    #[test]
    fn test_base_language() {
        assert_eq!(base_language("en-GB"), "en");
        assert_eq!(base_language("fr"), "fr");
        assert_eq!(base_language("sr_Latn_RS"), "sr");
    }
}
