//! Telemetry readings.
//!
//! A `Reading` is an append-only snapshot for one entity at one point in
//! time. Readings are never mutated after creation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::error::CoreError;

/// Vehicle count below which traffic is light.
pub const LIGHT_TRAFFIC_MAX: u32 = 20;
/// Vehicle count below which traffic is moderate.
pub const MODERATE_TRAFFIC_MAX: u32 = 35;

/// Discrete congestion level (ordered: light < moderate < heavy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum CongestionLevel {
    Light = 0,
    Moderate = 1,
    Heavy = 2,
}

impl CongestionLevel {
    /// Derive the level from a vehicle count (<20 light, <35 moderate).
    pub fn from_vehicle_count(count: u32) -> Self {
        if count < LIGHT_TRAFFIC_MAX {
            Self::Light
        } else if count < MODERATE_TRAFFIC_MAX {
            Self::Moderate
        } else {
            Self::Heavy
        }
    }

    /// Numeric level (0, 1 or 2).
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Moderate => "moderate",
            Self::Heavy => "heavy",
        }
    }
}

impl From<CongestionLevel> for u8 {
    fn from(level: CongestionLevel) -> Self {
        level.as_u8()
    }
}

impl TryFrom<u8> for CongestionLevel {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Light),
            1 => Ok(Self::Moderate),
            2 => Ok(Self::Heavy),
            other => Err(CoreError::InvalidCongestionLevel(other)),
        }
    }
}

impl fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a reading or plan came from.
///
/// This tag is the only thing that distinguishes degraded results from
/// healthy ones downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// Returned by the external optimization/detection service.
    Gateway,
    /// Computed locally by deterministic rules.
    RuleBased,
    /// Generated locally from randomized models.
    Synthetic,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gateway => "gateway",
            Self::RuleBased => "rule-based",
            Self::Synthetic => "synthetic",
        }
    }

    /// Whether the result was produced by a local fallback.
    pub fn is_fallback(&self) -> bool {
        !matches!(self, Self::Gateway)
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable telemetry snapshot for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub entity_id: EntityId,
    pub vehicle_count: u32,
    /// Average speed (km/h).
    pub avg_speed: f64,
    pub congestion: CongestionLevel,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_congestion_thresholds() {
        assert_eq!(CongestionLevel::from_vehicle_count(0), CongestionLevel::Light);
        assert_eq!(CongestionLevel::from_vehicle_count(19), CongestionLevel::Light);
        assert_eq!(CongestionLevel::from_vehicle_count(20), CongestionLevel::Moderate);
        assert_eq!(CongestionLevel::from_vehicle_count(34), CongestionLevel::Moderate);
        assert_eq!(CongestionLevel::from_vehicle_count(35), CongestionLevel::Heavy);
    }

    #[test]
    fn test_congestion_ordering() {
        assert!(CongestionLevel::Light < CongestionLevel::Moderate);
        assert!(CongestionLevel::Moderate < CongestionLevel::Heavy);
    }

    #[test]
    fn test_congestion_serializes_as_number() {
        assert_eq!(serde_json::to_string(&CongestionLevel::Heavy).unwrap(), "2");
        let level: CongestionLevel = serde_json::from_str("1").unwrap();
        assert_eq!(level, CongestionLevel::Moderate);
        assert!(serde_json::from_str::<CongestionLevel>("3").is_err());
    }

    #[test]
    fn test_provenance_labels() {
        assert_eq!(
            serde_json::to_string(&Provenance::RuleBased).unwrap(),
            "\"rule-based\""
        );
        assert!(!Provenance::Gateway.is_fallback());
        assert!(Provenance::Synthetic.is_fallback());
    }
}
