use std::env;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub localization: LocalizationConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Include internal error text (store/driver messages) in API responses
    #[serde(default)]
    pub expose_error_details: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalizationConfig {
    /// Last entry of every locale fallback chain
    #[serde(default = "default_locale")]
    pub default_locale: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Template store backend: "memory", "redis" or "postgres"
    #[serde(default = "default_store_backend")]
    pub backend: String,
    /// Key prefix for the Redis backend
    #[serde(default = "default_store_prefix")]
    pub redis_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    #[serde(default = "default_cb_failure_threshold")]
    pub circuit_breaker_failure_threshold: u32,
    #[serde(default = "default_cb_success_threshold")]
    pub circuit_breaker_success_threshold: u32,
    #[serde(default = "default_cb_reset_timeout")]
    pub circuit_breaker_reset_timeout_seconds: u64,
    #[serde(default = "default_backoff_initial_delay")]
    pub backoff_initial_delay_ms: u64,
    #[serde(default = "default_backoff_max_delay")]
    pub backoff_max_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Total attempts per message, first attempt included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between attempts
    #[serde(default = "default_back_off_period")]
    pub back_off_period_ms: u64,
    /// Upper bound on a single send waiting for the broker acknowledgement
    #[serde(default = "default_send_timeout")]
    pub send_timeout_ms: u64,
    /// Approximate MAXLEN applied to every event stream
    #[serde(default = "default_stream_max_len")]
    pub stream_max_len: usize,
    /// Channel used when a resolve request asks for a publish without naming one
    #[serde(default = "default_output_channel")]
    pub default_channel: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Pub/Sub channel carrying resolve requests
    #[serde(default = "default_request_channel")]
    pub channel: String,
    /// Stream the resolved messages are published to
    #[serde(default = "default_output_channel")]
    pub output_channel: String,
    /// Maximum resolve requests handled at once
    #[serde(default = "default_consumer_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_store_backend() -> String {
    "memory".to_string()
}

fn default_store_prefix() -> String {
    "pigeon:templates".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_cb_failure_threshold() -> u32 {
    5
}

fn default_cb_success_threshold() -> u32 {
    2
}

fn default_cb_reset_timeout() -> u64 {
    30
}

fn default_backoff_initial_delay() -> u64 {
    100
}

fn default_backoff_max_delay() -> u64 {
    30_000
}

fn default_database_url() -> String {
    "postgres://localhost:5432/pigeon".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_idle_timeout() -> u32 {
    600
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_back_off_period() -> u64 {
    1000
}

fn default_send_timeout() -> u64 {
    5000
}

fn default_stream_max_len() -> usize {
    10_000
}

fn default_output_channel() -> String {
    "pigeon.resolved".to_string()
}

fn default_request_channel() -> String {
    "pigeon.resolve.requests".to_string()
}

fn default_consumer_concurrency() -> usize {
    5
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "pigeon-localization-service".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

const STORE_BACKENDS: [&str; 3] = ["memory", "redis", "postgres"];

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let settings: Settings = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("localization.default_locale", default_locale())?
            .set_default("store.backend", default_store_backend())?
            .set_default("publisher.max_attempts", default_max_attempts())?
            .set_default("publisher.back_off_period_ms", default_back_off_period())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // PIGEON__PUBLISHER__MAX_ATTEMPTS, PIGEON__STORE__BACKEND, ...
            .add_source(
                Environment::with_prefix("PIGEON")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins"),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the services cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.localization.default_locale.trim().is_empty() {
            return Err(ConfigError::Message(
                "localization.default_locale must not be empty".to_string(),
            ));
        }
        if self.publisher.max_attempts < 1 {
            return Err(ConfigError::Message(
                "publisher.max_attempts must be at least 1".to_string(),
            ));
        }
        if !STORE_BACKENDS.contains(&self.store.backend.as_str()) {
            return Err(ConfigError::Message(format!(
                "store.backend must be one of {:?}, got '{}'",
                STORE_BACKENDS, self.store.backend
            )));
        }
        if self.consumer.enabled && self.consumer.concurrency == 0 {
            return Err(ConfigError::Message(
                "consumer.concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Redis is needed by the Redis store, the publisher and the consumer.
    pub fn requires_redis(&self) -> bool {
        self.store.backend == "redis" || self.publisher.enabled || self.consumer.enabled
    }
}

impl PublisherConfig {
    pub fn back_off_period(&self) -> Duration {
        Duration::from_millis(self.back_off_period_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            localization: LocalizationConfig::default(),
            store: StoreConfig::default(),
            redis: RedisConfig::default(),
            database: DatabaseConfig::default(),
            publisher: PublisherConfig::default(),
            consumer: ConsumerConfig::default(),
            logging: LoggingConfig::default(),
            otel: OtelConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
            expose_error_details: false,
        }
    }
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            default_locale: default_locale(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            redis_prefix: default_store_prefix(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            circuit_breaker_failure_threshold: default_cb_failure_threshold(),
            circuit_breaker_success_threshold: default_cb_success_threshold(),
            circuit_breaker_reset_timeout_seconds: default_cb_reset_timeout(),
            backoff_initial_delay_ms: default_backoff_initial_delay(),
            backoff_max_delay_ms: default_backoff_max_delay(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_max_attempts(),
            back_off_period_ms: default_back_off_period(),
            send_timeout_ms: default_send_timeout(),
            stream_max_len: default_stream_max_len(),
            default_channel: default_output_channel(),
        }
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            channel: default_request_channel(),
            output_channel: default_output_channel(),
            concurrency: default_consumer_concurrency(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}
