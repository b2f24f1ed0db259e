//! PostgreSQL-backed template store.
//!
//! Table `localized_message` with a unique index on
//! `(msg_template_id, locale)`, created at startup when missing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::postgres::PostgresPool;

use super::store::TemplateStore;
use super::types::{StoreError, TemplateRecord};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS localized_message (
        id UUID PRIMARY KEY,
        msg_template_id VARCHAR(256) NOT NULL,
        locale VARCHAR(35) NOT NULL,
        message TEXT NOT NULL,
        service_provider_id TEXT NOT NULL,
        service_consumer_id TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT uq_localized_message_template_locale UNIQUE (msg_template_id, locale)
    )
"#;

type TemplateRow = (Uuid, String, String, String, String, String, DateTime<Utc>);

fn from_row(row: TemplateRow) -> TemplateRecord {
    let (id, template_id, locale, message, service_provider_id, service_consumer_id, created_at) =
        row;
    TemplateRecord {
        id,
        template_id,
        locale,
        message,
        service_provider_id,
        service_consumer_id,
        created_at,
    }
}

pub struct PostgresTemplateStore {
    pool: Arc<PostgresPool>,
}

impl PostgresTemplateStore {
    pub fn new(pool: Arc<PostgresPool>) -> Self {
        Self { pool }
    }

    /// Creates the table when missing
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.pool
            .execute_with_circuit_breaker(|pool| async move {
                sqlx::query(CREATE_TABLE).execute(&pool).await
            })
            .await?;
        tracing::info!("localized_message table ready");
        Ok(())
    }
}

#[async_trait]
impl TemplateStore for PostgresTemplateStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn lookup(
        &self,
        template_id: &str,
        locale: &str,
    ) -> Result<Option<TemplateRecord>, StoreError> {
        let row: Option<TemplateRow> = self
            .pool
            .execute_with_circuit_breaker(|pool| async move {
                sqlx::query_as::<_, TemplateRow>(
                    r#"
                    SELECT id, msg_template_id, locale, message,
                           service_provider_id, service_consumer_id, created_at
                    FROM localized_message
                    WHERE msg_template_id = $1 AND locale = $2
                    "#,
                )
                .bind(template_id)
                .bind(locale)
                .fetch_optional(&pool)
                .await
            })
            .await?;

        Ok(row.map(from_row))
    }

    async fn insert(&self, record: TemplateRecord) -> Result<TemplateRecord, StoreError> {
        let inserted = self
            .pool
            .execute_with_circuit_breaker(|pool| {
                let record = &record;
                async move {
                    sqlx::query(
                        r#"
                        INSERT INTO localized_message
                            (id, msg_template_id, locale, message,
                             service_provider_id, service_consumer_id, created_at)
                        VALUES ($1, $2, $3, $4, $5, $6, $7)
                        ON CONFLICT (msg_template_id, locale) DO NOTHING
                        "#,
                    )
                    .bind(record.id)
                    .bind(&record.template_id)
                    .bind(&record.locale)
                    .bind(&record.message)
                    .bind(&record.service_provider_id)
                    .bind(&record.service_consumer_id)
                    .bind(record.created_at)
                    .execute(&pool)
                    .await
                }
            })
            .await?
            .rows_affected();

        if inserted == 0 {
            return Err(StoreError::Duplicate {
                template_id: record.template_id,
                locale: record.locale,
            });
        }

        tracing::debug!(
            template_id = %record.template_id,
            locale = %record.locale,
            "Template stored in PostgreSQL"
        );
        Ok(record)
    }

    async fn list(&self, template_id: &str) -> Result<Vec<TemplateRecord>, StoreError> {
        let rows: Vec<TemplateRow> = self
            .pool
            .execute_with_circuit_breaker(|pool| async move {
                sqlx::query_as::<_, TemplateRow>(
                    r#"
                    SELECT id, msg_template_id, locale, message,
                           service_provider_id, service_consumer_id, created_at
                    FROM localized_message
                    WHERE msg_template_id = $1
                    ORDER BY locale
                    "#,
                )
                .bind(template_id)
                .fetch_all(&pool)
                .await
            })
            .await?;

        Ok(rows.into_iter().map(from_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_mapping() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let record = from_row((
            id,
            "greeting".to_string(),
            "en".to_string(),
            "Hello {0}".to_string(),
            "p".to_string(),
            "c".to_string(),
            now,
        ));
        assert_eq!(record.id, id);
        assert_eq!(record.template_id, "greeting");
        assert_eq!(record.created_at, now);
    }

    #[test]
    fn test_schema_declares_uniqueness() {
        assert!(CREATE_TABLE.contains("UNIQUE (msg_template_id, locale)"));
    }
}
