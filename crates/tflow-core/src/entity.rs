//! Monitored entities (intersections and cameras).
//!
//! Entities are created by provisioning and never deleted by the engine.
//! Only two parts of an entity change at runtime:
//! - `status`, written by the health tracker
//! - `analytics`, written by the refresh scheduler

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::reading::{CongestionLevel, Provenance};

/// Stable entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Create a new entity id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw numeric id.
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| CoreError::InvalidEntityId(s.to_string()))
    }
}

/// Kind of monitored location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Intersection,
    Camera,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Intersection => write!(f, "intersection"),
            Self::Camera => write!(f, "camera"),
        }
    }
}

/// Lifecycle status of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    #[default]
    Active,
    Error,
    Offline,
    Maintenance,
}

impl EntityStatus {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Error => "error",
            Self::Offline => "offline",
            Self::Maintenance => "maintenance",
        }
    }

    /// All statuses, in declaration order.
    pub const ALL: [EntityStatus; 4] = [
        EntityStatus::Active,
        EntityStatus::Error,
        EntityStatus::Offline,
        EntityStatus::Maintenance,
    ];
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "error" => Ok(Self::Error),
            "offline" => Ok(Self::Offline),
            "maintenance" => Ok(Self::Maintenance),
            other => Err(CoreError::InvalidStatus(other.to_string())),
        }
    }
}

/// Geographic location (WGS84 degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Analytics fields maintained by the refresh scheduler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityAnalytics {
    /// When the last refresh cycle touched this entity.
    pub last_refreshed_at: Option<DateTime<Utc>>,
    /// Vehicle count from the latest reading.
    pub vehicle_count: Option<u32>,
    /// Average speed from the latest reading.
    pub avg_speed: Option<f64>,
    /// Congestion level from the latest reading.
    pub congestion: Option<CongestionLevel>,
    /// Provenance of the latest signal timing plan.
    pub plan_provenance: Option<Provenance>,
}

/// A monitored physical location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub status: EntityStatus,
    /// Endpoint answering health probes, if the device exposes one.
    #[serde(default)]
    pub probe_url: Option<String>,
    /// Feed or frame reference passed to the detection service.
    #[serde(default)]
    pub image_ref: Option<String>,
    #[serde(default)]
    pub analytics: EntityAnalytics,
}

impl Entity {
    /// Create an active entity with no probe endpoint or feed reference.
    pub fn new(id: EntityId, kind: EntityKind, name: impl Into<String>, location: GeoPoint) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            location,
            status: EntityStatus::Active,
            probe_url: None,
            image_ref: None,
            analytics: EntityAnalytics::default(),
        }
    }

    /// Whether refresh cycles should process this entity.
    pub fn is_active(&self) -> bool {
        self.status == EntityStatus::Active
    }

    /// Reference handed to the detection service.
    ///
    /// Cameras use their configured frame reference; everything else
    /// falls back to a stable per-entity feed name.
    pub fn feed_ref(&self) -> String {
        self.image_ref
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.kind, self.id))
    }
}
