//! Scheduler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use tflow_core::CycleKind;

/// Cadence intervals in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_traffic_refresh_mins")]
    pub traffic_refresh_mins: u64,
    #[serde(default = "default_camera_refresh_mins")]
    pub camera_refresh_mins: u64,
    #[serde(default = "default_analytics_refresh_mins")]
    pub analytics_refresh_mins: u64,
    #[serde(default = "default_health_probe_mins")]
    pub health_probe_mins: u64,
    /// Hours covered by each prediction request.
    #[serde(default = "default_prediction_horizon_hours")]
    pub prediction_horizon_hours: u32,
}

fn default_traffic_refresh_mins() -> u64 {
    5
}

fn default_camera_refresh_mins() -> u64 {
    2
}

fn default_analytics_refresh_mins() -> u64 {
    15
}

fn default_health_probe_mins() -> u64 {
    1
}

fn default_prediction_horizon_hours() -> u32 {
    6
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            traffic_refresh_mins: default_traffic_refresh_mins(),
            camera_refresh_mins: default_camera_refresh_mins(),
            analytics_refresh_mins: default_analytics_refresh_mins(),
            health_probe_mins: default_health_probe_mins(),
            prediction_horizon_hours: default_prediction_horizon_hours(),
        }
    }
}

impl SchedulerConfig {
    /// Period of one cadence. Zero is treated as one minute.
    pub fn cadence(&self, kind: CycleKind) -> Duration {
        let mins = match kind {
            CycleKind::TrafficRefresh => self.traffic_refresh_mins,
            CycleKind::CameraRefresh => self.camera_refresh_mins,
            CycleKind::Analytics => self.analytics_refresh_mins,
            CycleKind::HealthProbe => self.health_probe_mins,
        };
        Duration::from_secs(mins.max(1) * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cadences() {
        let config = SchedulerConfig::default();
        assert_eq!(config.cadence(CycleKind::CameraRefresh), Duration::from_secs(120));
        assert_eq!(config.cadence(CycleKind::Analytics), Duration::from_secs(900));

        let zero = SchedulerConfig {
            health_probe_mins: 0,
            ..SchedulerConfig::default()
        };
        assert_eq!(zero.cadence(CycleKind::HealthProbe), Duration::from_secs(60));
    }
}
