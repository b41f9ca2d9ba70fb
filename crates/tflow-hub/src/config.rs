//! Hub configuration.

use serde::{Deserialize, Serialize};

/// Broadcast hub and WebSocket server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Enable the WebSocket server. The hub itself always runs.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-client delivery buffer; deliveries beyond it are dropped.
    #[serde(default = "default_client_buffer")]
    pub client_buffer: usize,
    /// Maximum concurrent WebSocket connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_port() -> u16 {
    8080
}

fn default_client_buffer() -> usize {
    64
}

fn default_max_connections() -> usize {
    100
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            port: default_port(),
            client_buffer: default_client_buffer(),
            max_connections: default_max_connections(),
        }
    }
}
