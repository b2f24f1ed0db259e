//! Template store abstraction and in-memory backend.
//!
//! Stores answer exact `(templateID, locale)` lookups only; fallback across
//! locales is the resolver's job.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;

use super::types::{StoreError, TemplateRecord};

#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Backend label for logs, metrics and health output
    fn backend_name(&self) -> &'static str;

    /// Exact-match lookup
    async fn lookup(
        &self,
        template_id: &str,
        locale: &str,
    ) -> Result<Option<TemplateRecord>, StoreError>;

    /// Inserts a new record; fails with `StoreError::Duplicate` when the
    /// `(templateID, locale)` pair already exists.
    async fn insert(&self, record: TemplateRecord) -> Result<TemplateRecord, StoreError>;

    /// All locale variants of a template, ordered by locale
    async fn list(&self, template_id: &str) -> Result<Vec<TemplateRecord>, StoreError>;
}

/// Process-local store. Records are grouped per template so a lookup needs
/// no key allocation and listing comes out sorted.
#[derive(Default)]
pub struct MemoryTemplateStore {
    templates: DashMap<String, BTreeMap<String, TemplateRecord>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records across all templates
    pub fn len(&self) -> usize {
        self.templates.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn lookup(
        &self,
        template_id: &str,
        locale: &str,
    ) -> Result<Option<TemplateRecord>, StoreError> {
        Ok(self
            .templates
            .get(template_id)
            .and_then(|variants| variants.get(locale).cloned()))
    }

    async fn insert(&self, record: TemplateRecord) -> Result<TemplateRecord, StoreError> {
        let mut variants = self.templates.entry(record.template_id.clone()).or_default();

        match variants.entry(record.locale.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate {
                template_id: record.template_id,
                locale: record.locale,
            }),
            Entry::Vacant(slot) => Ok(slot.insert(record).clone()),
        }
    }

    async fn list(&self, template_id: &str) -> Result<Vec<TemplateRecord>, StoreError> {
        Ok(self
            .templates
            .get(template_id)
            .map(|variants| variants.values().cloned().collect())
            .unwrap_or_default())
    }
}
