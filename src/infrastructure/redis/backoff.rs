//! Reconnect delays for the resolve-request consumer

use std::time::Duration;

use rand::Rng;

use crate::config::RedisConfig;

#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Growth factor applied per attempt
    pub multiplier: f64,
    /// Relative jitter in 0.0..=1.0
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 100,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl From<&RedisConfig> for BackoffConfig {
    fn from(config: &RedisConfig) -> Self {
        Self {
            initial_delay_ms: config.backoff_initial_delay_ms.max(1),
            max_delay_ms: config.backoff_max_delay_ms.max(config.backoff_initial_delay_ms),
            ..Self::default()
        }
    }
}

/// Exponential backoff with jitter. The first delay equals the initial delay.
pub struct ExponentialBackoff {
    config: BackoffConfig,
    next_delay_ms: f64,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn with_config(config: BackoffConfig) -> Self {
        let initial = config.initial_delay_ms as f64;
        Self {
            config,
            next_delay_ms: initial,
            attempt: 0,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        self.attempt += 1;

        let base = self.next_delay_ms.min(self.config.max_delay_ms as f64);
        self.next_delay_ms = (base * self.config.multiplier).min(self.config.max_delay_ms as f64);

        let delay = if self.config.jitter_factor > 0.0 {
            let range = base * self.config.jitter_factor;
            base + rand::rng().random_range(-range..=range)
        } else {
            base
        };

        Duration::from_millis(delay.max(1.0) as u64)
    }

    pub fn reset(&mut self) {
        self.next_delay_ms = self.config.initial_delay_ms as f64;
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(initial_delay_ms: u64, max_delay_ms: u64) -> ExponentialBackoff {
        ExponentialBackoff::with_config(BackoffConfig {
            initial_delay_ms,
            max_delay_ms,
            multiplier: 2.0,
            jitter_factor: 0.0,
        })
    }

    #[test]
    fn test_delays_double_from_initial() {
        let mut backoff = no_jitter(100, 10_000);

        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(400));
        assert_eq!(backoff.attempt(), 3);
    }

    #[test]
    fn test_delay_capped() {
        let mut backoff = no_jitter(1000, 3000);

        for _ in 0..10 {
            assert!(backoff.next_delay() <= Duration::from_millis(3000));
        }
    }

    #[test]
    fn test_reset() {
        let mut backoff = no_jitter(50, 1000);
        backoff.next_delay();
        backoff.next_delay();

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(50));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let mut backoff = ExponentialBackoff::with_config(BackoffConfig {
            initial_delay_ms: 1000,
            max_delay_ms: 1000,
            multiplier: 2.0,
            jitter_factor: 0.1,
        });

        for _ in 0..20 {
            let ms = backoff.next_delay().as_millis();
            assert!((900..=1100).contains(&ms), "delay {ms} out of range");
        }
    }

    #[test]
    fn test_from_redis_config() {
        let redis = RedisConfig {
            backoff_initial_delay_ms: 250,
            backoff_max_delay_ms: 100,
            ..RedisConfig::default()
        };
        let config = BackoffConfig::from(&redis);
        assert_eq!(config.initial_delay_ms, 250);
        assert_eq!(config.max_delay_ms, 250);
    }
}
