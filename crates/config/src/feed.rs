use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;

fn default_name() -> String {
    "ids".to_string()
}

fn default_endpoint() -> String {
    "ws://127.0.0.1:8765".to_string()
}

fn default_buffer_capacity() -> usize {
    100
}

fn default_confidence() -> f64 {
    0.5
}

fn default_min_ms() -> u64 {
    500
}

fn default_max_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_health_addr() -> String {
    "0.0.0.0:8080".to_string()
}

/// Reconnect backoff bounds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackoffConfig {
    #[serde(default = "default_min_ms")]
    pub min_ms: u64,
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_ms: default_min_ms(),
            max_ms: default_max_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl BackoffConfig {
    pub fn min(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }
}

/// Live feed configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    /// Label used in logs and metrics
    #[serde(default = "default_name")]
    pub name: String,
    /// Classifier WebSocket endpoint (ws:// or wss://)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Number of most recent events retained
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    #[serde(default)]
    pub backoff: BackoffConfig,
    /// Used when the classifier confidence is missing, NaN or out of range
    #[serde(default = "default_confidence")]
    pub confidence_default: f64,
    /// Treat a silent connection as dead after this many seconds
    #[serde(default)]
    pub read_timeout_secs: Option<u64>,
    /// Health server bind address
    #[serde(default = "default_health_addr")]
    pub health_addr: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            endpoint: default_endpoint(),
            buffer_capacity: default_buffer_capacity(),
            backoff: BackoffConfig::default(),
            confidence_default: default_confidence(),
            read_timeout_secs: None,
            health_addr: default_health_addr(),
        }
    }
}

impl FeedConfig {
    /// Load and validate a YAML config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: FeedConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.endpoint).map_err(|e| {
            ConfigError::Validation(format!("invalid endpoint {:?}: {}", self.endpoint, e))
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::Validation(format!(
                "endpoint must use ws:// or wss://, got {}://",
                url.scheme()
            )));
        }
        if self.buffer_capacity == 0 {
            return Err(ConfigError::Validation(
                "buffer_capacity must be at least 1".to_string(),
            ));
        }
        if self.backoff.min_ms == 0 {
            return Err(ConfigError::Validation(
                "backoff.min_ms must be greater than 0".to_string(),
            ));
        }
        if self.backoff.min_ms > self.backoff.max_ms {
            return Err(ConfigError::Validation(format!(
                "backoff.min_ms ({}) exceeds backoff.max_ms ({})",
                self.backoff.min_ms, self.backoff.max_ms
            )));
        }
        if !self.backoff.multiplier.is_finite() || self.backoff.multiplier < 1.0 {
            return Err(ConfigError::Validation(format!(
                "backoff.multiplier must be >= 1.0, got {}",
                self.backoff.multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_default) {
            return Err(ConfigError::Validation(format!(
                "confidence_default must be within [0, 1], got {}",
                self.confidence_default
            )));
        }
        if self.read_timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "read_timeout_secs must be greater than 0 when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }
}
