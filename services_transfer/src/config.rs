//! Transfer configuration
//!
//! Loaded from JSON. Every field has a default, so an empty object (or a
//! document that only sets `version`) yields the stock timings.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Content type announced for every download
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream; charset=utf-8";

/// Errors raised while loading or storing a configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Failed to serialize transfer config: {0}")]
    SerializationFailed(String),

    #[error("Failed to deserialize transfer config: {0}")]
    DeserializationFailed(String),

    #[error("Unsupported transfer config version: {0}")]
    UnsupportedVersion(u32),

    #[error("Invalid transfer config: {0}")]
    Invalid(String),
}

/// Delivery settings shared by both strategies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Version of the config format
    pub version: u32,
    /// Period of the keep-alive sent to the delegate during a streaming transfer
    pub keep_alive_interval_ms: u64,
    /// How long a buffered download's object URL stays resolvable
    pub release_delay_ms: u64,
    pub content_type: String,
    /// Engines that mishandle streamed downloads; matched case-insensitively
    pub quirky_engines: Vec<String>,
    /// URL prefix under which the delegate serves downloads
    pub scope: String,
    /// Upper bound on a single credit wait. Unset means wait forever.
    pub credit_timeout_ms: Option<u64>,
}

impl TransferConfig {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_millis(self.keep_alive_interval_ms)
    }

    pub fn release_delay(&self) -> Duration {
        Duration::from_millis(self.release_delay_ms)
    }

    pub fn credit_timeout(&self) -> Option<Duration> {
        self.credit_timeout_ms.map(Duration::from_millis)
    }

    /// Returns true if `engine` is on the quirks list
    pub fn is_quirky(&self, engine: &str) -> bool {
        self.quirky_engines
            .iter()
            .any(|quirky| quirky.eq_ignore_ascii_case(engine))
    }

    /// Parses and validates a JSON document
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: TransferConfig = serde_json::from_slice(bytes)
            .map_err(|e| ConfigError::DeserializationFailed(e.to_string()))?;

        if config.version != Self::CURRENT_VERSION {
            return Err(ConfigError::UnsupportedVersion(config.version));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, ConfigError> {
        serde_json::to_vec_pretty(self).map_err(|e| ConfigError::SerializationFailed(e.to_string()))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.keep_alive_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "keep_alive_interval_ms must be positive".to_string(),
            ));
        }
        if !self.scope.ends_with('/') {
            return Err(ConfigError::Invalid(format!(
                "scope '{}' must end with '/'",
                self.scope
            )));
        }
        Ok(())
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            keep_alive_interval_ms: 10_000,
            release_delay_ms: 10_000,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            quirky_engines: vec!["safari".to_string()],
            scope: "/downloads/".to_string(),
            credit_timeout_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransferConfig::default();
        assert_eq!(config.keep_alive_interval(), Duration::from_secs(10));
        assert_eq!(config.release_delay(), Duration::from_secs(10));
        assert_eq!(config.credit_timeout(), None);
        assert!(config.is_quirky("Safari"));
        assert!(!config.is_quirky("firefox"));
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config =
            TransferConfig::from_json(br#"{"version": 1, "credit_timeout_ms": 250}"#).unwrap();
        assert_eq!(config.credit_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.scope, "/downloads/");
        assert_eq!(config.content_type, DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn test_round_trip_through_json() {
        let mut config = TransferConfig::default();
        config.quirky_engines.push("legacy-webview".to_string());
        let bytes = config.to_json().unwrap();
        assert_eq!(TransferConfig::from_json(&bytes).unwrap(), config);
    }

    #[test]
    fn test_rejects_unknown_version() {
        let err = TransferConfig::from_json(br#"{"version": 7}"#).unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedVersion(7));
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            TransferConfig::from_json(br#"{"keep_alive_interval_ms": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            TransferConfig::from_json(br#"{"scope": "/dl"}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            TransferConfig::from_json(b"not json"),
            Err(ConfigError::DeserializationFailed(_))
        ));
    }
}
