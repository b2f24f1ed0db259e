use std::sync::Arc;
use std::time::Instant;

use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::error::{AppError, ErrorTranslator};
use crate::localization::{
    create_template_store, LocaleResolver, MessageService, StoreError, TemplateStore,
};
use crate::postgres::{PostgresPool, PostgresPoolError};
use crate::publish::{RedisStreamSender, ReliablePublisher, RetryPolicy};
use crate::redis::{CircuitBreaker, CircuitBreakerConfig, PoolError, RedisHealth, RedisPool};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Redis setup failed: {0}")]
    Redis(#[from] PoolError),

    #[error("PostgreSQL setup failed: {0}")]
    Postgres(#[from] PostgresPoolError),

    #[error("Template store setup failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub message_service: Arc<MessageService>,
    /// Absent when `publisher.enabled` is false
    pub publisher: Option<Arc<ReliablePublisher>>,
    pub error_translator: Arc<ErrorTranslator>,
    pub redis_pool: Option<Arc<RedisPool>>,
    pub postgres_pool: Option<Arc<PostgresPool>>,
    /// Cancelled on process shutdown; stops retry loops and the consumer
    pub shutdown: CancellationToken,
    pub start_time: Instant,
}

impl AppState {
    /// Builds pools, the template store and the publisher from settings.
    pub async fn initialize(settings: Settings) -> Result<Self, StartupError> {
        let breaker_config = CircuitBreakerConfig::from(&settings.redis);

        let redis_pool = if settings.requires_redis() {
            let pool = RedisPool::new(
                &settings.redis,
                Arc::new(CircuitBreaker::with_config("redis", breaker_config.clone())),
                Arc::new(RedisHealth::new()),
            )?;
            tracing::info!(url = %pool.url(), "Redis pool created");
            Some(Arc::new(pool))
        } else {
            None
        };

        let postgres_pool = if settings.store.backend == "postgres" {
            let pool = PostgresPool::new(
                &settings.database,
                Arc::new(CircuitBreaker::with_config("postgres", breaker_config)),
            )
            .await?;
            Some(Arc::new(pool))
        } else {
            None
        };

        let store =
            create_template_store(&settings.store, redis_pool.clone(), postgres_pool.clone())
                .await?;

        let publisher = match (&redis_pool, settings.publisher.enabled) {
            (Some(pool), true) => {
                let sender =
                    RedisStreamSender::new(pool.clone(), settings.publisher.stream_max_len);
                let policy = RetryPolicy::from(&settings.publisher);
                tracing::info!(
                    max_attempts = policy.max_attempts,
                    back_off_ms = settings.publisher.back_off_period_ms,
                    "Reliable publisher enabled"
                );
                Some(Arc::new(ReliablePublisher::new(Arc::new(sender), policy)))
            }
            _ => {
                tracing::info!("Reliable publisher disabled");
                None
            }
        };

        let mut state = Self::with_components(settings, store, publisher);
        state.redis_pool = redis_pool;
        state.postgres_pool = postgres_pool;
        Ok(state)
    }

    /// Assembles state around an existing store and publisher, without
    /// external pools.
    pub fn with_components(
        settings: Settings,
        store: Arc<dyn TemplateStore>,
        publisher: Option<Arc<ReliablePublisher>>,
    ) -> Self {
        let resolver = LocaleResolver::new(settings.localization.default_locale.clone());
        let message_service = Arc::new(MessageService::new(store, resolver));
        let error_translator = Arc::new(ErrorTranslator::new(
            message_service.clone(),
            settings.server.expose_error_details,
        ));

        Self {
            settings: Arc::new(settings),
            message_service,
            publisher,
            error_translator,
            redis_pool: None,
            postgres_pool: None,
            shutdown: CancellationToken::new(),
            start_time: Instant::now(),
        }
    }

    /// Localized error response for `err` raised while serving `path`
    pub async fn error_response(&self, err: AppError, path: &str) -> Response {
        self.error_translator
            .translate(&err, path)
            .await
            .into_response()
    }
}
