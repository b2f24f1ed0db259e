//! Redis-backed template store.
//!
//! Each template is one hash at `{prefix}:{templateID}`; the field is the
//! locale and the value the JSON-encoded record. A record that does not
//! decode is reported as a serialization error by both reads.

use std::sync::Arc;

use async_trait::async_trait;

use crate::redis::{RedisPool, RedisPoolExt};

use super::store::TemplateStore;
use super::types::{StoreError, TemplateRecord};

pub struct RedisTemplateStore {
    pool: Arc<RedisPool>,
    prefix: String,
}

impl RedisTemplateStore {
    pub fn new(pool: Arc<RedisPool>, prefix: impl Into<String>) -> Self {
        Self {
            pool,
            prefix: prefix.into(),
        }
    }

    fn key(&self, template_id: &str) -> String {
        format!("{}:{}", self.prefix, template_id)
    }
}

#[async_trait]
impl TemplateStore for RedisTemplateStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn lookup(
        &self,
        template_id: &str,
        locale: &str,
    ) -> Result<Option<TemplateRecord>, StoreError> {
        let key = self.key(template_id);
        match self.pool.hget(&key, locale).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, record: TemplateRecord) -> Result<TemplateRecord, StoreError> {
        let key = self.key(&record.template_id);
        let value = serde_json::to_string(&record)?;

        if self.pool.hset_nx(&key, &record.locale, &value).await? {
            tracing::debug!(
                template_id = %record.template_id,
                locale = %record.locale,
                "Template stored in Redis"
            );
            Ok(record)
        } else {
            Err(StoreError::Duplicate {
                template_id: record.template_id,
                locale: record.locale,
            })
        }
    }

    async fn list(&self, template_id: &str) -> Result<Vec<TemplateRecord>, StoreError> {
        let key = self.key(template_id);
        let entries = self.pool.hgetall(&key).await?;
        decode_variants(entries).map_err(|e| {
            tracing::warn!(template_id = %template_id, error = %e, "Undecodable template record");
            e
        })
    }
}

/// Decodes `(locale, json)` hash entries, ordered by locale.
fn decode_variants(entries: Vec<(String, String)>) -> Result<Vec<TemplateRecord>, StoreError> {
    let mut records = entries
        .iter()
        .map(|(_, raw)| serde_json::from_str::<TemplateRecord>(raw))
        .collect::<Result<Vec<_>, _>>()?;
    records.sort_by(|a, b| a.locale.cmp(&b.locale));
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedisConfig;
    use crate::domain::localization::store::tests::record;
    use crate::redis::{CircuitBreaker, RedisHealth};

    fn store_with_open_circuit() -> RedisTemplateStore {
        let cb = Arc::new(CircuitBreaker::new("redis"));
        for _ in 0..5 {
            cb.record_failure();
        }
        let pool = RedisPool::new(&RedisConfig::default(), cb, Arc::new(RedisHealth::new())).unwrap();
        RedisTemplateStore::new(Arc::new(pool), "pigeon:templates")
    }

    #[test]
    fn test_key_layout() {
        let store = store_with_open_circuit();
        assert_eq!(store.key("greeting"), "pigeon:templates:greeting");
    }

    #[tokio::test]
    async fn test_open_circuit_reports_unavailable() {
        let store = store_with_open_circuit();
        let err = store.lookup("greeting", "en").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    fn entry(locale: &str, message: &str) -> (String, String) {
        let raw = serde_json::to_string(&record("greeting", locale, message)).unwrap();
        (locale.to_string(), raw)
    }

    #[test]
    fn test_decode_variants_sorted_by_locale() {
        let records =
            decode_variants(vec![entry("fr", "Bonjour"), entry("en", "Hello")]).unwrap();
        let locales: Vec<&str> = records.iter().map(|r| r.locale.as_str()).collect();
        assert_eq!(locales, vec!["en", "fr"]);
        assert_eq!(records[1].message, "Bonjour");
    }

    #[test]
    fn test_decode_variants_rejects_corrupt_record() {
        let entries = vec![entry("en", "Hello"), ("fr".to_string(), "{not json".to_string())];
        let err = decode_variants(entries).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
