//! Health tracker configuration.

use serde::{Deserialize, Serialize};

/// Health tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Consecutive failures tolerated before an entity enters `error`.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// EMA weight of a new latency sample (0.0-1.0).
    #[serde(default = "default_latency_smoothing")]
    pub latency_smoothing: f64,
    /// EMA weight of a new uptime sample (0.0-1.0).
    #[serde(default = "default_uptime_smoothing")]
    pub uptime_smoothing: f64,
    /// Timeout for HTTP probes in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Success rates for entities without a probe endpoint.
    #[serde(default)]
    pub simulated: SimulatedRates,
}

/// Simulated probe behaviour per status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedRates {
    #[serde(default = "default_active_rate")]
    pub active: f64,
    #[serde(default = "default_error_rate")]
    pub error: f64,
    #[serde(default = "default_offline_rate")]
    pub offline: f64,
    /// Intentionally low: maintenance work disrupts the device.
    #[serde(default = "default_maintenance_rate")]
    pub maintenance: f64,
    #[serde(default = "default_min_latency_ms")]
    pub min_latency_ms: f64,
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: f64,
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_latency_smoothing() -> f64 {
    0.3
}

fn default_uptime_smoothing() -> f64 {
    0.05
}

fn default_probe_timeout_ms() -> u64 {
    3_000
}

fn default_active_rate() -> f64 {
    0.95
}

fn default_error_rate() -> f64 {
    0.6
}

fn default_offline_rate() -> f64 {
    0.3
}

fn default_maintenance_rate() -> f64 {
    0.2
}

fn default_min_latency_ms() -> f64 {
    20.0
}

fn default_max_latency_ms() -> f64 {
    200.0
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            latency_smoothing: default_latency_smoothing(),
            uptime_smoothing: default_uptime_smoothing(),
            probe_timeout_ms: default_probe_timeout_ms(),
            simulated: SimulatedRates::default(),
        }
    }
}

impl Default for SimulatedRates {
    fn default() -> Self {
        Self {
            active: default_active_rate(),
            error: default_error_rate(),
            offline: default_offline_rate(),
            maintenance: default_maintenance_rate(),
            min_latency_ms: default_min_latency_ms(),
            max_latency_ms: default_max_latency_ms(),
        }
    }
}
