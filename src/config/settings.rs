//! # Configuration Settings
//!
//! Environment-driven settings for logging and remote signing.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{Result, SignError};

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), json_logging: false }
    }
}

impl ObservabilityConfig {
    /// Load from `CERTLOOM_LOG_LEVEL` and `CERTLOOM_LOG_JSON`.
    pub fn from_env() -> Self {
        let log_level = std::env::var("CERTLOOM_LOG_LEVEL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "info".to_string());

        let json_logging = std::env::var("CERTLOOM_LOG_JSON")
            .ok()
            .map(|value| parse_bool(&value))
            .unwrap_or(false);

        Self { log_level, json_logging }
    }
}

/// Settings for talking to remote signing authorities.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RemoteSettings {
    /// Authority address that overrides every profile's remote when set
    pub remote: Option<String>,

    /// Per-request timeout in seconds
    #[validate(range(
        min = 1,
        max = 300,
        message = "Remote timeout must be between 1 and 300 seconds"
    ))]
    pub timeout_seconds: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self { remote: None, timeout_seconds: 30 }
    }
}

impl RemoteSettings {
    /// Load from `CERTLOOM_REMOTE` and `CERTLOOM_REMOTE_TIMEOUT_SECONDS`.
    pub fn from_env() -> Result<Self> {
        let remote = std::env::var("CERTLOOM_REMOTE")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let timeout_seconds = match std::env::var("CERTLOOM_REMOTE_TIMEOUT_SECONDS") {
            Ok(value) => value.trim().parse::<u64>().map_err(|e| {
                SignError::config_error(format!("Invalid remote timeout '{}': {}", value, e))
            })?,
            Err(_) => 30,
        };

        let settings = Self { remote, timeout_seconds };
        settings.validate_settings()?;
        Ok(settings)
    }

    /// Validate with the derived rules.
    pub fn validate_settings(&self) -> Result<()> {
        Validate::validate(self).map_err(|e| SignError::config_error(e.to_string()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Serializes tests that read or write process environment variables.
#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
