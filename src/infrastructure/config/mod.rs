mod settings;

pub use settings::{
    ConsumerConfig, DatabaseConfig, LocalizationConfig, LoggingConfig, OtelConfig,
    PublisherConfig, RedisConfig, ServerConfig, Settings, StoreConfig,
};
