//! Bus configuration with validation.

use crate::DEFAULT_REQUEST_TIMEOUT_MS;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("Invalid status interval: {0}")]
    InvalidInterval(String),
}

/// Router and correlator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Timeout for requests that do not specify one (milliseconds)
    pub request_timeout_ms: u64,
    /// Period of the host status broadcast; `None` disables it
    pub status_interval_ms: Option<u64>,
    /// Answer requests on channels without a handler with an error instead
    /// of leaving the caller to time out
    pub reject_unhandled_requests: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            status_interval_ms: None,
            reject_unhandled_requests: false,
        }
    }
}

impl BusConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MESH_REQUEST_TIMEOUT_MS`: Default request timeout (default: 30000)
    /// - `MESH_STATUS_INTERVAL_MS`: Status broadcast period (default: disabled)
    /// - `MESH_REJECT_UNHANDLED`: Reject requests without handler (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            request_timeout_ms: env::var("MESH_REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_timeout_ms),

            status_interval_ms: env::var("MESH_STATUS_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .or(defaults.status_interval_ms),

            reject_unhandled_requests: env::var("MESH_REJECT_UNHANDLED")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.reject_unhandled_requests),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout(
                "request_timeout_ms cannot be 0".into(),
            ));
        }

        if self.status_interval_ms == Some(0) {
            return Err(ConfigError::InvalidInterval(
                "status_interval_ms cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Default request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Status broadcast period, if enabled
    pub fn status_interval(&self) -> Option<Duration> {
        self.status_interval_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BusConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.status_interval().is_none());
        assert!(!config.reject_unhandled_requests);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = BusConfig {
            request_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = BusConfig {
            status_interval_ms: Some(0),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidInterval(_))));
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: BusConfig = serde_json::from_str(r#"{"status_interval_ms": 30000}"#).unwrap();
        assert_eq!(config.request_timeout_ms, DEFAULT_REQUEST_TIMEOUT_MS);
        assert_eq!(config.status_interval(), Some(Duration::from_secs(30)));
    }
}
