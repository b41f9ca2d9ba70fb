//! Health state tracker.
//!
//! Counts consecutive probe failures, smooths latency and uptime, and
//! decides status transitions. Only transitions produce events.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use tflow_core::{
    ConnectionQuality, EntityId, EntityStatus, EventKind, HealthEvent, HealthRecord,
};
use tflow_telemetry::Metrics;

use crate::config::HealthConfig;

/// Jitter applied to each uptime sample.
const UPTIME_NOISE: f64 = 0.5;

/// Result of one probe attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Success { latency_ms: f64 },
    Failure { error: String, latency_ms: Option<f64> },
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    fn latency_ms(&self) -> Option<f64> {
        match self {
            Self::Success { latency_ms } => Some(*latency_ms),
            Self::Failure { latency_ms, .. } => *latency_ms,
        }
    }
}

/// What the tracker concluded from one probe.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub entity_id: EntityId,
    pub previous: EntityStatus,
    pub status: EntityStatus,
    pub quality: ConnectionQuality,
    pub record: HealthRecord,
    /// Present only when the status changed.
    pub event: Option<HealthEvent>,
}

impl ProbeReport {
    pub fn status_changed(&self) -> bool {
        self.previous != self.status
    }
}

#[derive(Debug, Clone)]
struct EntityHealth {
    status: EntityStatus,
    record: HealthRecord,
    latency_samples: u64,
}

impl EntityHealth {
    fn new(entity_id: EntityId, status: EntityStatus) -> Self {
        Self {
            status,
            record: HealthRecord::new(entity_id),
            latency_samples: 0,
        }
    }
}

/// Per-entity health state machine.
///
/// Updates for one entity happen while holding that entity's map entry,
/// so concurrent probes serialize per entity and never lose a count.
pub struct HealthTracker<R = StdRng> {
    config: HealthConfig,
    entities: DashMap<EntityId, EntityHealth>,
    rng: Mutex<R>,
}

impl HealthTracker<StdRng> {
    pub fn new(config: HealthConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn seeded(config: HealthConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> HealthTracker<R> {
    pub fn with_rng(config: HealthConfig, rng: R) -> Self {
        Self {
            config,
            entities: DashMap::new(),
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Start tracking an entity. Existing state is left untouched.
    pub fn register(&self, entity_id: EntityId, status: EntityStatus) {
        self.entities
            .entry(entity_id)
            .or_insert_with(|| EntityHealth::new(entity_id, status));
    }

    /// Apply an externally owned status change (maintenance windows,
    /// operator decommissioning). Never produces an event.
    ///
    /// Leaving maintenance clears the failure counter. Returns the
    /// previous status.
    pub fn set_external_status(&self, entity_id: EntityId, status: EntityStatus) -> EntityStatus {
        let mut entry = self
            .entities
            .entry(entity_id)
            .or_insert_with(|| EntityHealth::new(entity_id, status));
        let previous = entry.status;

        if previous == EntityStatus::Maintenance && status != EntityStatus::Maintenance {
            entry.record.consecutive_failures = 0;
        }
        entry.status = status;

        if previous != status {
            info!(
                entity_id = %entity_id,
                previous = %previous,
                status = %status,
                "External status change"
            );
        }
        previous
    }

    /// Reconcile with the status stored in the registry.
    ///
    /// The tracker owns active/error/offline transitions. Only moves into
    /// or out of maintenance are taken from the registry.
    pub fn sync_external(&self, entity_id: EntityId, stored: EntityStatus) {
        let current = match self.status(entity_id) {
            Some(current) => current,
            None => {
                self.register(entity_id, stored);
                return;
            }
        };
        let entering = stored == EntityStatus::Maintenance && current != EntityStatus::Maintenance;
        let leaving = current == EntityStatus::Maintenance && stored != EntityStatus::Maintenance;
        if entering || leaving {
            self.set_external_status(entity_id, stored);
        }
    }

    /// Fold one probe outcome into the entity's state.
    ///
    /// Unknown entities are tracked from `active`.
    pub fn record_probe(
        &self,
        entity_id: EntityId,
        outcome: ProbeOutcome,
        now: DateTime<Utc>,
    ) -> ProbeReport {
        let mut entry = self
            .entities
            .entry(entity_id)
            .or_insert_with(|| EntityHealth::new(entity_id, EntityStatus::Active));
        let health = entry.value_mut();
        let previous = health.status;

        if let Some(sample) = outcome.latency_ms() {
            health.record.latency_ms = if health.latency_samples == 0 {
                sample
            } else {
                let alpha = self.config.latency_smoothing;
                (1.0 - alpha) * health.record.latency_ms + alpha * sample
            };
            health.latency_samples += 1;
        }

        let uptime_sample = if outcome.is_success() { 100.0 } else { 0.0 };
        let noise = self.rng.lock().gen_range(-UPTIME_NOISE..=UPTIME_NOISE);
        let alpha = self.config.uptime_smoothing;
        health.record.uptime_pct = ((1.0 - alpha) * health.record.uptime_pct
            + alpha * (uptime_sample + noise))
            .clamp(0.0, 100.0);
        health.record.updated_at = now;

        let mut transition = None;
        match outcome {
            ProbeOutcome::Success { .. } => {
                health.record.consecutive_failures = 0;
                health.record.last_success_at = Some(now);
                health.record.last_error = None;
                if matches!(previous, EntityStatus::Error | EntityStatus::Offline) {
                    health.status = EntityStatus::Active;
                    transition = Some(EventKind::ConnectionRestored);
                }
            }
            ProbeOutcome::Failure { error, .. } => {
                health.record.consecutive_failures =
                    health.record.consecutive_failures.saturating_add(1);
                health.record.last_error = Some(error);
                let over_threshold =
                    health.record.consecutive_failures > self.config.failure_threshold;
                if over_threshold
                    && !matches!(previous, EntityStatus::Error | EntityStatus::Maintenance)
                {
                    health.status = EntityStatus::Error;
                    transition = Some(EventKind::ConnectionLost);
                }
            }
        }

        let status = health.status;
        let record = health.record.clone();
        drop(entry);

        let event = transition.map(|kind| {
            Metrics::health_transition(kind);
            match kind {
                EventKind::ConnectionLost => warn!(
                    entity_id = %entity_id,
                    failures = record.consecutive_failures,
                    last_error = ?record.last_error,
                    "Connection lost"
                ),
                EventKind::ConnectionRestored => info!(
                    entity_id = %entity_id,
                    previous = %previous,
                    latency_ms = record.latency_ms,
                    "Connection restored"
                ),
            }
            HealthEvent::new(kind, previous, status, record.clone())
        });

        debug!(
            entity_id = %entity_id,
            status = %status,
            failures = record.consecutive_failures,
            latency_ms = record.latency_ms,
            uptime_pct = record.uptime_pct,
            "Probe recorded"
        );

        ProbeReport {
            entity_id,
            previous,
            status,
            quality: record.quality(),
            record,
            event,
        }
    }

    pub fn status(&self, entity_id: EntityId) -> Option<EntityStatus> {
        self.entities.get(&entity_id).map(|h| h.status)
    }

    pub fn record(&self, entity_id: EntityId) -> Option<HealthRecord> {
        self.entities.get(&entity_id).map(|h| h.record.clone())
    }

    pub fn quality(&self, entity_id: EntityId) -> Option<ConnectionQuality> {
        self.entities.get(&entity_id).map(|h| h.record.quality())
    }

    /// Snapshot of every tracked entity, ordered by id.
    pub fn summary(&self) -> Vec<(EntityStatus, HealthRecord)> {
        let mut rows: Vec<_> = self
            .entities
            .iter()
            .map(|h| (h.status, h.record.clone()))
            .collect();
        rows.sort_by_key(|(_, record)| record.entity_id);
        rows
    }

    /// Number of tracked entities per status, in `EntityStatus::ALL` order.
    pub fn status_counts(&self) -> Vec<(EntityStatus, i64)> {
        let mut counts: Vec<(EntityStatus, i64)> =
            EntityStatus::ALL.iter().map(|s| (*s, 0)).collect();
        for health in self.entities.iter() {
            if let Some(slot) = counts.iter_mut().find(|(s, _)| *s == health.status) {
                slot.1 += 1;
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl<R> std::fmt::Debug for HealthTracker<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthTracker")
            .field("config", &self.config)
            .field("entities", &self.entities.len())
            .finish_non_exhaustive()
    }
}
