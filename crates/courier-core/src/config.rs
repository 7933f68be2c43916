//! Queue configuration.
//!
//! Loaded in priority order (highest first):
//! 1. `COURIER_`-prefixed environment variables (e.g. `COURIER_MAX_RETRIES`)
//! 2. `courier.toml` in the working directory, if present
//! 3. Built-in defaults

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::CourierError;

const CONFIG_FILE: &str = "courier.toml";
const ENV_PREFIX: &str = "COURIER_";

pub const TIMEOUT_SECONDS_DEFAULT: u64 = 5;
pub const BACKOFF_STEP_SECONDS_DEFAULT: u64 = 1;
pub const MAX_RETRIES_DEFAULT: u32 = 5;
pub const BATCH_SIZE_DEFAULT: usize = 10;
pub const WAIT_SECONDS_DEFAULT: u64 = 10;
pub const LISTEN_COOLDOWN_SECONDS_DEFAULT: u64 = 5;

/// Transports cap a single receive at this many messages.
pub const BATCH_SIZE_MAX: usize = 10;

/// Per-queue reliability policy.
///
/// Every instance carries its own values, so several queues with different
/// policies can live in one process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Transport address of the queue.
    pub queue_url: String,

    /// Deadline for delete (and the hand-off to the handler) per message.
    /// 0 means the default.
    pub timeout_seconds: u64,

    /// Seconds added to `NextDelayRetry` on each send. 0 means the default.
    pub backoff_step_seconds: u64,

    /// Failed deliveries tolerated per message identity.
    pub max_retries: u32,

    /// Messages requested per receive.
    pub batch_size: usize,

    /// Long-poll wait per receive.
    pub wait_seconds: u64,

    /// Pause before restarting a listen loop that failed.
    pub listen_cooldown_seconds: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_url: String::new(),
            timeout_seconds: TIMEOUT_SECONDS_DEFAULT,
            backoff_step_seconds: BACKOFF_STEP_SECONDS_DEFAULT,
            max_retries: MAX_RETRIES_DEFAULT,
            batch_size: BATCH_SIZE_DEFAULT,
            wait_seconds: WAIT_SECONDS_DEFAULT,
            listen_cooldown_seconds: LISTEN_COOLDOWN_SECONDS_DEFAULT,
        }
    }
}

impl QueueConfig {
    pub fn new(queue_url: impl Into<String>) -> Self {
        Self {
            queue_url: queue_url.into(),
            ..Self::default()
        }
    }

    /// Load from defaults, `courier.toml` and the environment.
    pub fn load() -> Result<Self, CourierError> {
        Self::from_figment(
            Figment::new()
                .merge(Serialized::defaults(Self::default()))
                .merge(Toml::file(CONFIG_FILE))
                .merge(Env::prefixed(ENV_PREFIX)),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self, CourierError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CourierError> {
        if self.max_retries == 0 {
            return Err(CourierError::InvalidConfig(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 || self.batch_size > BATCH_SIZE_MAX {
            return Err(CourierError::InvalidConfig(format!(
                "batch_size must be within 1..={BATCH_SIZE_MAX}, got {}",
                self.batch_size
            )));
        }
        Ok(())
    }

    pub fn ack_timeout(&self) -> Duration {
        match self.timeout_seconds {
            0 => Duration::from_secs(TIMEOUT_SECONDS_DEFAULT),
            secs => Duration::from_secs(secs),
        }
    }

    pub fn backoff_step(&self) -> u64 {
        match self.backoff_step_seconds {
            0 => BACKOFF_STEP_SECONDS_DEFAULT,
            secs => secs,
        }
    }

    pub fn listen_cooldown(&self) -> Duration {
        Duration::from_secs(self.listen_cooldown_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    #[test]
    fn defaults_match_documented_constants() {
        let config = QueueConfig::default();
        assert_eq!(config.ack_timeout(), Duration::from_secs(5));
        assert_eq!(config.backoff_step(), 1);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.wait_seconds, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_timeout_and_step_fall_back_to_defaults() {
        let config = QueueConfig {
            timeout_seconds: 0,
            backoff_step_seconds: 0,
            ..QueueConfig::default()
        };
        assert_eq!(config.ack_timeout(), Duration::from_secs(TIMEOUT_SECONDS_DEFAULT));
        assert_eq!(config.backoff_step(), BACKOFF_STEP_SECONDS_DEFAULT);
    }

    #[rstest]
    #[case::no_retries(0, 10)]
    #[case::empty_batch(5, 0)]
    #[case::batch_too_large(5, 11)]
    fn validate_rejects(#[case] max_retries: u32, #[case] batch_size: usize) {
        let config = QueueConfig {
            max_retries,
            batch_size,
            ..QueueConfig::default()
        };
        assert!(matches!(config.validate(), Err(CourierError::InvalidConfig(_))));
    }

    #[test]
    fn load_layers_file_and_environment() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                queue_url = "memory://orders"
                max_retries = 3
                timeout_seconds = 2
                "#,
            )?;
            jail.set_env("COURIER_MAX_RETRIES", "7");

            let config = QueueConfig::load().expect("config loads");
            assert_eq!(config.queue_url, "memory://orders");
            assert_eq!(config.timeout_seconds, 2);
            assert_eq!(config.max_retries, 7);
            assert_eq!(config.batch_size, BATCH_SIZE_DEFAULT);
            Ok(())
        });
    }

    #[test]
    fn load_rejects_invalid_values() {
        Jail::expect_with(|jail| {
            jail.set_env("COURIER_BATCH_SIZE", "25");
            assert!(matches!(
                QueueConfig::load(),
                Err(CourierError::InvalidConfig(_))
            ));
            Ok(())
        });
    }
}
