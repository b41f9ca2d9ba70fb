//! Analytics results: signal timing plans and traffic predictions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::reading::Provenance;

/// Computed signal timing recommendation.
///
/// Produced once per analytics cycle, superseded (never deleted) by the
/// next plan for the same entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalTimingPlan {
    pub entity_id: EntityId,
    pub green_secs: u32,
    pub yellow_secs: u32,
    pub red_secs: u32,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub provenance: Provenance,
    /// Human-readable explanation of the recommendation.
    pub rationale: String,
    pub created_at: DateTime<Utc>,
}

impl SignalTimingPlan {
    /// Full signal cycle length in seconds.
    pub fn cycle_secs(&self) -> u32 {
        self.green_secs + self.yellow_secs + self.red_secs
    }
}

/// Congestion risk label for a predicted volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CongestionRisk {
    Low,
    Medium,
    High,
}

impl CongestionRisk {
    /// Label a predicted volume (>35 high, >20 medium, else low).
    pub fn from_volume(volume: u32) -> Self {
        if volume > 35 {
            Self::High
        } else if volume > 20 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// One future-traffic estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub at: DateTime<Utc>,
    pub predicted_volume: u32,
    pub confidence: f64,
    pub risk: CongestionRisk,
}

/// A short horizon of predictions for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSet {
    pub entity_id: EntityId,
    pub predictions: Vec<Prediction>,
    pub provenance: Provenance,
    pub generated_at: DateTime<Utc>,
}
