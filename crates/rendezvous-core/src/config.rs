//! Engine configuration loaded from TOML.
//!
//! Every field has a default, so an empty file is a valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub scheduling: SchedulingConfig,
    pub delivery: DeliveryConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulingConfig {
    /// Reject a new schedule while another one for the same vendor and
    /// add-on is still scheduled or in progress.
    pub enforce_single_active: bool,

    /// How many times a write that lost an optimistic-concurrency race is
    /// re-planned before giving up.
    pub max_write_retries: u32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            enforce_single_active: false,
            max_write_retries: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Total dispatch attempts per notification, including the first.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    /// Interval of the background retry loop.
    pub poll_interval_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 2_000,
            multiplier: 2.0,
            poll_interval_ms: 500,
        }
    }
}

impl DeliveryConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: Duration::from_millis(self.base_delay_ms),
            multiplier: self.multiplier,
            max_attempts: self.max_attempts,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotificationConfig {
    /// `From` address of outbound mail.
    pub sender: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            sender: "no-reply@rendezvous.local".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduling.max_write_retries == 0 {
            return Err(ConfigError::Validation(
                "scheduling.max_write_retries must be at least 1".into(),
            ));
        }
        if self.delivery.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "delivery.max_attempts must be at least 1".into(),
            ));
        }
        if !(self.delivery.multiplier >= 1.0 && self.delivery.multiplier.is_finite()) {
            return Err(ConfigError::Validation(
                "delivery.multiplier must be a finite number >= 1.0".into(),
            ));
        }
        if self.notifications.sender.trim().is_empty() {
            return Err(ConfigError::Validation(
                "notifications.sender must not be empty".into(),
            ));
        }
        Ok(())
    }
}
