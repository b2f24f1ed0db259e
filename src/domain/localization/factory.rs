//! Template store factory

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::postgres::PostgresPool;
use crate::redis::RedisPool;

use super::postgres_store::PostgresTemplateStore;
use super::redis_store::RedisTemplateStore;
use super::store::{MemoryTemplateStore, TemplateStore};
use super::types::StoreError;

/// Builds the store selected by `store.backend`:
/// - `"postgres"`: `PostgresTemplateStore`, creating its table when missing
/// - `"redis"`: `RedisTemplateStore` under `store.redis_prefix`
/// - `"memory"` (default): `MemoryTemplateStore`
///
/// A backend whose pool was not provided falls back to memory with a warning.
pub async fn create_template_store(
    settings: &StoreConfig,
    redis_pool: Option<Arc<RedisPool>>,
    postgres_pool: Option<Arc<PostgresPool>>,
) -> Result<Arc<dyn TemplateStore>, StoreError> {
    match settings.backend.as_str() {
        "postgres" => {
            if let Some(pool) = postgres_pool {
                tracing::info!(
                    backend = "postgres",
                    url = %pool.database_url_masked(),
                    "Creating PostgreSQL template store"
                );
                let store = PostgresTemplateStore::new(pool);
                store.ensure_schema().await?;
                Ok(Arc::new(store))
            } else {
                tracing::warn!(
                    "PostgreSQL template store requested but no pool provided, falling back to memory"
                );
                Ok(Arc::new(MemoryTemplateStore::new()))
            }
        }
        "redis" => {
            if let Some(pool) = redis_pool {
                tracing::info!(
                    backend = "redis",
                    prefix = %settings.redis_prefix,
                    "Creating Redis template store"
                );
                Ok(Arc::new(RedisTemplateStore::new(
                    pool,
                    settings.redis_prefix.clone(),
                )))
            } else {
                tracing::warn!(
                    "Redis template store requested but no pool provided, falling back to memory"
                );
                Ok(Arc::new(MemoryTemplateStore::new()))
            }
        }
        _ => {
            tracing::info!(backend = "memory", "Creating in-memory template store");
            Ok(Arc::new(MemoryTemplateStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RedisConfig;
    use crate::redis::{CircuitBreaker, RedisHealth};

    #[tokio::test]
    async fn test_memory_backend_default() {
        let store = create_template_store(&StoreConfig::default(), None, None)
            .await
            .unwrap();
        assert_eq!(store.backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_missing_pool_falls_back_to_memory() {
        for backend in ["redis", "postgres"] {
            let settings = StoreConfig {
                backend: backend.to_string(),
                ..StoreConfig::default()
            };
            let store = create_template_store(&settings, None, None).await.unwrap();
            assert_eq!(store.backend_name(), "memory");
        }
    }

    #[tokio::test]
    async fn test_redis_backend_with_pool() {
        let pool = RedisPool::new(
            &RedisConfig::default(),
            Arc::new(CircuitBreaker::new("redis")),
            Arc::new(RedisHealth::new()),
        )
        .unwrap();
        let settings = StoreConfig {
            backend: "redis".to_string(),
            ..StoreConfig::default()
        };

        let store = create_template_store(&settings, Some(Arc::new(pool)), None)
            .await
            .unwrap();
        assert_eq!(store.backend_name(), "redis");
    }
}
