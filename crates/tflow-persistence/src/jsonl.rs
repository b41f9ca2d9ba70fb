//! Memory store with an append-only JSON Lines audit trail.

use std::future::ready;
use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::warn;

use tflow_core::{
    ActivityEntry, Entity, EntityAnalytics, EntityId, EntityStatus, HealthEvent, HealthRecord,
    PredictionSet, Reading, SignalTimingPlan,
};

use crate::config::Retention;
use crate::error::PersistenceResult;
use crate::memory::MemoryStore;
use crate::storage::{BoxFuture, Storage};
use crate::writer::{AuditRecord, JsonLinesWriter};

/// Queries are served from memory; every data write is also appended to
/// the daily audit file.
///
/// The memory write lands first. If it fails nothing is audited; if the
/// audit append then fails, the row stays queryable and the append error
/// is returned, so callers count the write as failed.
pub struct JsonLinesStore {
    memory: MemoryStore,
    writer: Mutex<JsonLinesWriter>,
}

impl JsonLinesStore {
    pub fn open(
        base_dir: impl AsRef<Path>,
        buffer_size: usize,
        retention: Retention,
    ) -> PersistenceResult<Self> {
        Ok(Self {
            memory: MemoryStore::with_retention(retention),
            writer: Mutex::new(JsonLinesWriter::new(base_dir, buffer_size)?),
        })
    }

    /// Underlying memory store (for inspection and failure injection).
    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    fn append(&self, record: AuditRecord) -> PersistenceResult<()> {
        self.writer.lock().add_record(record).map_err(|e| {
            warn!(error = %e, "Audit append failed");
            e
        })
    }

    fn write_then_audit<T: Clone>(
        &self,
        value: T,
        write: impl FnOnce(&MemoryStore, T) -> PersistenceResult<()>,
        audit: impl FnOnce(T) -> AuditRecord,
    ) -> PersistenceResult<()> {
        write(&self.memory, value.clone())?;
        self.append(audit(value))
    }

    pub fn flush_now(&self) -> PersistenceResult<()> {
        self.writer.lock().flush()
    }
}

impl Storage for JsonLinesStore {
    fn entities(&self) -> BoxFuture<'_, PersistenceResult<Vec<Entity>>> {
        self.memory.entities()
    }

    fn entity(&self, id: EntityId) -> BoxFuture<'_, PersistenceResult<Option<Entity>>> {
        self.memory.entity(id)
    }

    fn update_entity_status(
        &self,
        id: EntityId,
        status: EntityStatus,
    ) -> BoxFuture<'_, PersistenceResult<()>> {
        self.memory.update_entity_status(id, status)
    }

    fn update_entity_analytics(
        &self,
        id: EntityId,
        analytics: EntityAnalytics,
    ) -> BoxFuture<'_, PersistenceResult<()>> {
        self.memory.update_entity_analytics(id, analytics)
    }

    fn insert_reading(&self, reading: Reading) -> BoxFuture<'_, PersistenceResult<()>> {
        Box::pin(ready(self.write_then_audit(
            reading,
            MemoryStore::insert_reading_now,
            AuditRecord::Reading,
        )))
    }

    fn latest_reading(&self, id: EntityId) -> BoxFuture<'_, PersistenceResult<Option<Reading>>> {
        self.memory.latest_reading(id)
    }

    fn readings_in_range(
        &self,
        id: EntityId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BoxFuture<'_, PersistenceResult<Vec<Reading>>> {
        self.memory.readings_in_range(id, from, to)
    }

    fn insert_plan(&self, plan: SignalTimingPlan) -> BoxFuture<'_, PersistenceResult<()>> {
        Box::pin(ready(self.write_then_audit(
            plan,
            MemoryStore::insert_plan_now,
            AuditRecord::Plan,
        )))
    }

    fn latest_plan(
        &self,
        id: EntityId,
    ) -> BoxFuture<'_, PersistenceResult<Option<SignalTimingPlan>>> {
        self.memory.latest_plan(id)
    }

    fn insert_predictions(&self, set: PredictionSet) -> BoxFuture<'_, PersistenceResult<()>> {
        Box::pin(ready(self.write_then_audit(
            set,
            MemoryStore::insert_predictions_now,
            AuditRecord::Predictions,
        )))
    }

    fn save_health_record(&self, record: HealthRecord) -> BoxFuture<'_, PersistenceResult<()>> {
        Box::pin(ready(self.write_then_audit(
            record,
            MemoryStore::save_health_now,
            AuditRecord::Health,
        )))
    }

    fn insert_event(&self, event: HealthEvent) -> BoxFuture<'_, PersistenceResult<()>> {
        Box::pin(ready(self.write_then_audit(
            event,
            MemoryStore::insert_event_now,
            AuditRecord::Event,
        )))
    }

    fn events_in_range(
        &self,
        id: Option<EntityId>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BoxFuture<'_, PersistenceResult<Vec<HealthEvent>>> {
        self.memory.events_in_range(id, from, to)
    }

    fn record_activity(&self, entry: ActivityEntry) -> BoxFuture<'_, PersistenceResult<()>> {
        Box::pin(ready(self.write_then_audit(
            entry,
            MemoryStore::record_activity_now,
            AuditRecord::Activity,
        )))
    }

    fn provision(&self, entities: Vec<Entity>) -> BoxFuture<'_, PersistenceResult<usize>> {
        self.memory.provision(entities)
    }

    fn flush(&self) -> BoxFuture<'_, PersistenceResult<()>> {
        Box::pin(ready(self.flush_now()))
    }
}

impl std::fmt::Debug for JsonLinesStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesStore")
            .field("memory", &self.memory)
            .field("pending", &self.writer.lock().pending())
            .finish()
    }
}
