//! Core domain types for the tflow telemetry refresh engine.
//!
//! This crate provides the data model shared by every other crate:
//! - `Entity`: a monitored intersection or camera and its lifecycle status
//! - `Reading`: an immutable telemetry snapshot with provenance
//! - `SignalTimingPlan`, `PredictionSet`: analytics results
//! - `HealthRecord`, `HealthEvent`: per-entity health state and transitions
//! - `ActivityEntry`: audit entries for per-entity cycle failures
//! - `Topic`: broadcast channel names (`global`, `entity-<id>`)

pub mod activity;
pub mod cycle;
pub mod entity;
pub mod error;
pub mod health;
pub mod plan;
pub mod reading;
pub mod topic;

pub use activity::{ActivityEntry, Severity};
pub use cycle::CycleKind;
pub use entity::{Entity, EntityAnalytics, EntityId, EntityKind, EntityStatus, GeoPoint};
pub use error::{CoreError, Result};
pub use health::{ConnectionQuality, EventKind, HealthEvent, HealthRecord};
pub use plan::{CongestionRisk, Prediction, PredictionSet, SignalTimingPlan};
pub use reading::{CongestionLevel, Provenance, Reading};
pub use topic::Topic;
