//! Messages delivered to subscribers and frames received from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tflow_core::{
    ConnectionQuality, CycleKind, Entity, EntityAnalytics, EntityId, EntityKind, EntityStatus,
    HealthEvent, HealthRecord, PredictionSet, Reading, SignalTimingPlan, Topic,
};

/// Message published to a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubMessage {
    /// Fresh reading from a traffic or camera refresh.
    ReadingUpdate { reading: Reading },

    /// Signal plan and forecast from the analytics cycle.
    AnalyticsUpdate {
        entity_id: EntityId,
        plan: SignalTimingPlan,
        predictions: PredictionSet,
    },

    /// Result of one health probe.
    HealthUpdate {
        entity_id: EntityId,
        status: EntityStatus,
        quality: ConnectionQuality,
        record: HealthRecord,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event: Option<HealthEvent>,
    },

    /// Status of every entity after a cycle.
    BulkSnapshot {
        cycle: CycleKind,
        entities: Vec<EntitySummary>,
        at: DateTime<Utc>,
    },
}

impl HubMessage {
    /// Entity the message is about, if any.
    pub fn entity_id(&self) -> Option<EntityId> {
        match self {
            Self::ReadingUpdate { reading } => Some(reading.entity_id),
            Self::AnalyticsUpdate { entity_id, .. } | Self::HealthUpdate { entity_id, .. } => {
                Some(*entity_id)
            }
            Self::BulkSnapshot { .. } => None,
        }
    }

    /// Natural topic: the entity's own, or global for snapshots.
    pub fn topic(&self) -> Topic {
        self.entity_id().map(Topic::Entity).unwrap_or(Topic::Global)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ReadingUpdate { .. } => "reading_update",
            Self::AnalyticsUpdate { .. } => "analytics_update",
            Self::HealthUpdate { .. } => "health_update",
            Self::BulkSnapshot { .. } => "bulk_snapshot",
        }
    }
}

/// One row of a bulk snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub id: EntityId,
    pub kind: EntityKind,
    pub name: String,
    pub status: EntityStatus,
    pub analytics: EntityAnalytics,
}

impl From<&Entity> for EntitySummary {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id,
            kind: entity.kind,
            name: entity.name.clone(),
            status: entity.status,
            analytics: entity.analytics.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionAction {
    Subscribe,
    Unsubscribe,
}

/// Frame sent by a WebSocket client.
///
/// `{"action":"subscribe","topic":"entity-7"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientFrame {
    pub action: SubscriptionAction,
    pub topic: Topic,
}
