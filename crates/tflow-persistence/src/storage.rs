//! Storage trait.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};

use tflow_core::{
    ActivityEntry, Entity, EntityAnalytics, EntityId, EntityStatus, HealthEvent, HealthRecord,
    PredictionSet, Reading, SignalTimingPlan,
};

use crate::error::PersistenceResult;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Persistence operations used by the refresh engine.
///
/// The entity registry is owned by provisioning; the engine only reads it
/// and updates status and analytics fields.
pub trait Storage: Send + Sync {
    /// All entities, ordered by id.
    fn entities(&self) -> BoxFuture<'_, PersistenceResult<Vec<Entity>>>;

    fn entity(&self, id: EntityId) -> BoxFuture<'_, PersistenceResult<Option<Entity>>>;

    fn update_entity_status(
        &self,
        id: EntityId,
        status: EntityStatus,
    ) -> BoxFuture<'_, PersistenceResult<()>>;

    fn update_entity_analytics(
        &self,
        id: EntityId,
        analytics: EntityAnalytics,
    ) -> BoxFuture<'_, PersistenceResult<()>>;

    fn insert_reading(&self, reading: Reading) -> BoxFuture<'_, PersistenceResult<()>>;

    /// Most recent reading by `recorded_at`.
    fn latest_reading(&self, id: EntityId) -> BoxFuture<'_, PersistenceResult<Option<Reading>>>;

    /// Readings with `from <= recorded_at < to`, oldest first.
    fn readings_in_range(
        &self,
        id: EntityId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BoxFuture<'_, PersistenceResult<Vec<Reading>>>;

    fn insert_plan(&self, plan: SignalTimingPlan) -> BoxFuture<'_, PersistenceResult<()>>;

    fn latest_plan(
        &self,
        id: EntityId,
    ) -> BoxFuture<'_, PersistenceResult<Option<SignalTimingPlan>>>;

    fn insert_predictions(&self, set: PredictionSet) -> BoxFuture<'_, PersistenceResult<()>>;

    fn save_health_record(&self, record: HealthRecord) -> BoxFuture<'_, PersistenceResult<()>>;

    fn insert_event(&self, event: HealthEvent) -> BoxFuture<'_, PersistenceResult<()>>;

    /// Events with `from <= at < to`, oldest first. `None` means every entity.
    fn events_in_range(
        &self,
        id: Option<EntityId>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BoxFuture<'_, PersistenceResult<Vec<HealthEvent>>>;

    fn record_activity(&self, entry: ActivityEntry) -> BoxFuture<'_, PersistenceResult<()>>;

    /// Insert or replace entities. Returns how many were written.
    fn provision(&self, entities: Vec<Entity>) -> BoxFuture<'_, PersistenceResult<usize>>;

    /// Push buffered writes to durable storage.
    fn flush(&self) -> BoxFuture<'_, PersistenceResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
