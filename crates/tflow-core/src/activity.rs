//! Activity log entries.
//!
//! Written when a single entity fails inside a refresh cycle, so the
//! failure is auditable without aborting the rest of the cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cycle::CycleKind;
use crate::entity::EntityId;

/// Severity of an activity entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Audit entry for cycle-level activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub at: DateTime<Utc>,
    pub cycle: CycleKind,
    pub entity_id: Option<EntityId>,
    pub severity: Severity,
    pub message: String,
}

impl ActivityEntry {
    pub fn new(
        cycle: CycleKind,
        entity_id: Option<EntityId>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            at: Utc::now(),
            cycle,
            entity_id,
            severity,
            message: message.into(),
        }
    }
}
