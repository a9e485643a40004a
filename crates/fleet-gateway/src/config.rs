//! Gateway configuration types.
//!
//! This module defines configuration structures for the HTTP gateway.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the gateway service.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:8080").
    #[serde(default = "GatewayConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Directory holding the `RocksDB` database.
    #[serde(default = "GatewayConfig::default_data_dir")]
    pub data_dir: String,

    /// Row lock wait for store transactions, in milliseconds.
    #[serde(default)]
    pub lock_timeout_ms: i64,

    /// Allowed CORS origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    #[serde(default = "GatewayConfig::default_max_body")]
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    #[serde(default = "GatewayConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl GatewayConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:8080".to_string()
    }

    fn default_data_dir() -> String {
        "/data/fleet".to_string()
    }

    const fn default_max_body() -> usize {
        64 * 1024 // 64 KB
    }

    const fn default_request_timeout() -> u64 {
        30
    }

    /// Build a configuration from `LISTEN_ADDR`, `DATA_DIR` and
    /// `LOCK_TIMEOUT_MS`, falling back to defaults for unset variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `LOCK_TIMEOUT_MS` is set but not an integer.
    pub fn from_env() -> Result<Self, std::num::ParseIntError> {
        let mut config = Self::default();

        if let Ok(listen_addr) = std::env::var("LISTEN_ADDR") {
            config.listen_addr = listen_addr;
        }
        if let Ok(data_dir) = std::env::var("DATA_DIR") {
            config.data_dir = data_dir;
        }
        if let Ok(lock_timeout) = std::env::var("LOCK_TIMEOUT_MS") {
            config.lock_timeout_ms = lock_timeout.trim().parse()?;
        }

        Ok(config)
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            data_dir: Self::default_data_dir(),
            lock_timeout_ms: 0,
            cors_origins: vec!["*".to_string()],
            max_body_bytes: Self::default_max_body(),
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.data_dir, "/data/fleet");
        assert_eq!(config.lock_timeout_ms, 0);
        assert_eq!(config.max_body_bytes, 64 * 1024);
    }

    #[test]
    fn timeout_duration() {
        let config = GatewayConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn deserialize_with_defaults() {
        let config: GatewayConfig =
            serde_json::from_str(r#"{"listen_addr": "127.0.0.1:9000", "lock_timeout_ms": 50}"#)
                .unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.lock_timeout_ms, 50);
        assert_eq!(config.request_timeout_seconds, 30);
        assert!(config.cors_origins.is_empty());
    }
}
