//! Health records and health transition events.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{EntityId, EntityStatus};

/// Per-entity health state, owned by the health tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub entity_id: EntityId,
    pub consecutive_failures: u32,
    pub last_success_at: Option<DateTime<Utc>>,
    /// Smoothed probe latency in milliseconds.
    pub latency_ms: f64,
    /// Smoothed uptime percentage in [0, 100].
    pub uptime_pct: f64,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl HealthRecord {
    /// Fresh record for a newly tracked entity.
    pub fn new(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            consecutive_failures: 0,
            last_success_at: None,
            latency_ms: 0.0,
            uptime_pct: 100.0,
            last_error: None,
            updated_at: Utc::now(),
        }
    }

    /// Quality label for the current smoothed latency.
    pub fn quality(&self) -> ConnectionQuality {
        ConnectionQuality::from_latency_ms(self.latency_ms)
    }
}

/// Connection quality derived from latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl ConnectionQuality {
    /// ≤60 excellent, ≤100 good, ≤150 fair, otherwise poor.
    pub fn from_latency_ms(latency_ms: f64) -> Self {
        if latency_ms <= 60.0 {
            Self::Excellent
        } else if latency_ms <= 100.0 {
            Self::Good
        } else if latency_ms <= 150.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
        }
    }
}

impl fmt::Display for ConnectionQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of health transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ConnectionLost,
    ConnectionRestored,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionLost => "connection_lost",
            Self::ConnectionRestored => "connection_restored",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit record of a health status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthEvent {
    pub id: Uuid,
    pub entity_id: EntityId,
    pub kind: EventKind,
    pub previous: EntityStatus,
    pub new: EntityStatus,
    /// Record snapshot that triggered the transition.
    pub record: HealthRecord,
    pub at: DateTime<Utc>,
}

impl HealthEvent {
    pub fn new(
        kind: EventKind,
        previous: EntityStatus,
        new: EntityStatus,
        record: HealthRecord,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_id: record.entity_id,
            kind,
            previous,
            new,
            at: record.updated_at,
            record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_quality_mapping() {
        assert_eq!(ConnectionQuality::from_latency_ms(45.0), ConnectionQuality::Excellent);
        assert_eq!(ConnectionQuality::from_latency_ms(60.0), ConnectionQuality::Excellent);
        assert_eq!(ConnectionQuality::from_latency_ms(70.0), ConnectionQuality::Good);
        assert_eq!(ConnectionQuality::from_latency_ms(100.0), ConnectionQuality::Good);
        assert_eq!(ConnectionQuality::from_latency_ms(150.0), ConnectionQuality::Fair);
        assert_eq!(ConnectionQuality::from_latency_ms(160.0), ConnectionQuality::Poor);
    }

    #[test]
    fn test_event_takes_entity_from_record() {
        let record = HealthRecord::new(EntityId::new(3));
        let event = HealthEvent::new(
            EventKind::ConnectionLost,
            EntityStatus::Active,
            EntityStatus::Error,
            record.clone(),
        );
        assert_eq!(event.entity_id, EntityId::new(3));
        assert_eq!(event.at, record.updated_at);

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"connection_lost\""));
        assert!(json.contains("\"new\":\"error\""));
    }
}
