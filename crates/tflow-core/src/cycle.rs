//! Refresh cycle kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One recurring cadence driven by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleKind {
    /// Intersection traffic readings.
    TrafficRefresh,
    /// Camera detection readings.
    CameraRefresh,
    /// Signal timing plans and predictions.
    Analytics,
    /// Health probes for every entity.
    HealthProbe,
}

impl CycleKind {
    pub const ALL: [CycleKind; 4] = [
        CycleKind::TrafficRefresh,
        CycleKind::CameraRefresh,
        CycleKind::Analytics,
        CycleKind::HealthProbe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TrafficRefresh => "traffic_refresh",
            Self::CameraRefresh => "camera_refresh",
            Self::Analytics => "analytics",
            Self::HealthProbe => "health_probe",
        }
    }
}

impl fmt::Display for CycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
