//! Gateway configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lower bound on the request timeout.
pub const MIN_TIMEOUT_MS: u64 = 2_000;
/// Upper bound on the request timeout.
pub const MAX_TIMEOUT_MS: u64 = 5_000;

/// External service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// When false every request is answered `Unavailable` without I/O.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Base URL of the optimization service.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in milliseconds (clamped to 2000..=5000).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Upstream API credential, forwarded as a bearer token.
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_enabled() -> bool {
    true
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_timeout_ms() -> u64 {
    4_000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            api_key: None,
        }
    }
}

impl GatewayConfig {
    /// Timeout actually applied to requests.
    pub fn effective_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS))
    }

    /// Whether an upstream credential is configured.
    pub fn has_credentials(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_clamped() {
        let mut config = GatewayConfig::default();
        assert_eq!(config.effective_timeout(), Duration::from_millis(4_000));

        config.timeout_ms = 100;
        assert_eq!(config.effective_timeout(), Duration::from_millis(MIN_TIMEOUT_MS));

        config.timeout_ms = 60_000;
        assert_eq!(config.effective_timeout(), Duration::from_millis(MAX_TIMEOUT_MS));
    }

    #[test]
    fn test_credentials() {
        let mut config = GatewayConfig::default();
        assert!(!config.has_credentials());
        config.api_key = Some(String::new());
        assert!(!config.has_credentials());
        config.api_key = Some("secret".to_string());
        assert!(config.has_credentials());
    }
}
