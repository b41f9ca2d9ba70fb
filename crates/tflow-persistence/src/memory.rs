//! In-process store.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::future::ready;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use tflow_core::{
    ActivityEntry, Entity, EntityAnalytics, EntityId, EntityStatus, HealthEvent, HealthRecord,
    PredictionSet, Reading, SignalTimingPlan,
};

use crate::config::Retention;
use crate::error::{PersistenceError, PersistenceResult};
use crate::storage::{BoxFuture, Storage};

#[derive(Default)]
struct Tables {
    entities: BTreeMap<EntityId, Entity>,
    readings: HashMap<EntityId, VecDeque<Reading>>,
    plans: HashMap<EntityId, VecDeque<SignalTimingPlan>>,
    predictions: HashMap<EntityId, VecDeque<PredictionSet>>,
    health: HashMap<EntityId, HealthRecord>,
    events: VecDeque<HealthEvent>,
    activity: VecDeque<ActivityEntry>,
}

/// Insert `row` keeping `rows` ordered by `key`, then drop the oldest rows
/// beyond `limit`. Rows with equal keys keep insertion order.
fn push_bounded<T>(
    rows: &mut VecDeque<T>,
    row: T,
    limit: usize,
    key: impl Fn(&T) -> DateTime<Utc>,
) {
    let at = key(&row);
    let index = rows.partition_point(|r| key(r) <= at);
    rows.insert(index, row);
    while rows.len() > limit.max(1) {
        rows.pop_front();
    }
}

/// Rows of an ordered table with `from <= key < to`.
fn in_range<T: Clone>(
    rows: &VecDeque<T>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    key: impl Fn(&T) -> DateTime<Utc>,
) -> Vec<T> {
    let start = rows.partition_point(|r| key(r) < from);
    rows.iter()
        .skip(start)
        .take_while(|r| key(r) < to)
        .cloned()
        .collect()
}

/// Store kept entirely in memory.
///
/// Writes can be made to fail, globally or for chosen entities, to
/// exercise persistence-failure paths. History is bounded by
/// [`Retention`]; the oldest rows are dropped first.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    retention: Retention,
    fail_writes: AtomicBool,
    failing_entities: Mutex<HashSet<EntityId>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: Retention) -> Self {
        Self {
            retention,
            ..Self::default()
        }
    }

    pub fn retention(&self) -> Retention {
        self.retention
    }

    /// Store pre-populated with entities.
    pub fn with_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        let store = Self::new();
        store.provision_now(entities);
        store
    }

    /// Make every data write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make data writes for one entity fail.
    pub fn fail_entity(&self, id: EntityId) {
        self.failing_entities.lock().insert(id);
    }

    pub fn heal_entity(&self, id: EntityId) {
        self.failing_entities.lock().remove(&id);
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Synchronous operations (shared with JsonLinesStore)
    // ------------------------------------------------------------------

    fn check_write(&self, id: Option<EntityId>) -> PersistenceResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("writes disabled".to_string()));
        }
        if let Some(id) = id {
            if self.failing_entities.lock().contains(&id) {
                return Err(PersistenceError::Unavailable(format!(
                    "writes for entity {id} disabled"
                )));
            }
        }
        Ok(())
    }

    fn written(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    pub fn entities_now(&self) -> Vec<Entity> {
        self.tables.read().entities.values().cloned().collect()
    }

    pub fn entity_now(&self, id: EntityId) -> Option<Entity> {
        self.tables.read().entities.get(&id).cloned()
    }

    pub(crate) fn update_status_now(
        &self,
        id: EntityId,
        status: EntityStatus,
    ) -> PersistenceResult<()> {
        self.check_write(Some(id))?;
        let mut tables = self.tables.write();
        let entity = tables
            .entities
            .get_mut(&id)
            .ok_or(PersistenceError::NotFound(id))?;
        entity.status = status;
        drop(tables);
        self.written();
        Ok(())
    }

    pub(crate) fn update_analytics_now(
        &self,
        id: EntityId,
        analytics: EntityAnalytics,
    ) -> PersistenceResult<()> {
        self.check_write(Some(id))?;
        let mut tables = self.tables.write();
        let entity = tables
            .entities
            .get_mut(&id)
            .ok_or(PersistenceError::NotFound(id))?;
        entity.analytics = analytics;
        drop(tables);
        self.written();
        Ok(())
    }

    pub(crate) fn insert_reading_now(&self, reading: Reading) -> PersistenceResult<()> {
        self.check_write(Some(reading.entity_id))?;
        let mut tables = self.tables.write();
        push_bounded(
            tables.readings.entry(reading.entity_id).or_default(),
            reading,
            self.retention.rows_per_entity,
            |r| r.recorded_at,
        );
        self.written();
        Ok(())
    }

    pub fn latest_reading_now(&self, id: EntityId) -> Option<Reading> {
        self.tables
            .read()
            .readings
            .get(&id)
            .and_then(|rows| rows.back().cloned())
    }

    pub fn readings_in_range_now(
        &self,
        id: EntityId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<Reading> {
        self.tables
            .read()
            .readings
            .get(&id)
            .map(|rows| in_range(rows, from, to, |r| r.recorded_at))
            .unwrap_or_default()
    }

    pub(crate) fn insert_plan_now(&self, plan: SignalTimingPlan) -> PersistenceResult<()> {
        self.check_write(Some(plan.entity_id))?;
        let mut tables = self.tables.write();
        push_bounded(
            tables.plans.entry(plan.entity_id).or_default(),
            plan,
            self.retention.rows_per_entity,
            |p| p.created_at,
        );
        self.written();
        Ok(())
    }

    pub fn latest_plan_now(&self, id: EntityId) -> Option<SignalTimingPlan> {
        self.tables
            .read()
            .plans
            .get(&id)
            .and_then(|rows| rows.back().cloned())
    }

    pub(crate) fn insert_predictions_now(&self, set: PredictionSet) -> PersistenceResult<()> {
        self.check_write(Some(set.entity_id))?;
        let mut tables = self.tables.write();
        push_bounded(
            tables.predictions.entry(set.entity_id).or_default(),
            set,
            self.retention.rows_per_entity,
            |p| p.generated_at,
        );
        self.written();
        Ok(())
    }

    pub fn latest_predictions_now(&self, id: EntityId) -> Option<PredictionSet> {
        self.tables
            .read()
            .predictions
            .get(&id)
            .and_then(|rows| rows.back().cloned())
    }

    pub(crate) fn save_health_now(&self, record: HealthRecord) -> PersistenceResult<()> {
        self.check_write(Some(record.entity_id))?;
        self.tables.write().health.insert(record.entity_id, record);
        self.written();
        Ok(())
    }

    pub fn health_record_now(&self, id: EntityId) -> Option<HealthRecord> {
        self.tables.read().health.get(&id).cloned()
    }

    pub(crate) fn insert_event_now(&self, event: HealthEvent) -> PersistenceResult<()> {
        self.check_write(Some(event.entity_id))?;
        push_bounded(
            &mut self.tables.write().events,
            event,
            self.retention.log_entries,
            |e| e.at,
        );
        self.written();
        Ok(())
    }

    pub fn events_in_range_now(
        &self,
        id: Option<EntityId>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<HealthEvent> {
        in_range(&self.tables.read().events, from, to, |e| e.at)
            .into_iter()
            .filter(|e| id.map_or(true, |id| e.entity_id == id))
            .collect()
    }

    /// Every retained event, oldest first.
    pub fn events_now(&self) -> Vec<HealthEvent> {
        self.tables.read().events.iter().cloned().collect()
    }

    /// Activity entries are audit data and ignore entity-level failure
    /// injection, otherwise the failure they describe would be lost too.
    pub(crate) fn record_activity_now(&self, entry: ActivityEntry) -> PersistenceResult<()> {
        self.check_write(None)?;
        let mut tables = self.tables.write();
        tables.activity.push_back(entry);
        while tables.activity.len() > self.retention.log_entries.max(1) {
            tables.activity.pop_front();
        }
        drop(tables);
        self.written();
        Ok(())
    }

    pub fn activity_now(&self) -> Vec<ActivityEntry> {
        self.tables.read().activity.iter().cloned().collect()
    }

    pub fn provision_now(&self, entities: impl IntoIterator<Item = Entity>) -> usize {
        let mut tables = self.tables.write();
        let mut count = 0;
        for entity in entities {
            tables.entities.insert(entity.id, entity);
            count += 1;
        }
        debug!(count, total = tables.entities.len(), "Entities provisioned");
        count
    }
}

impl Storage for MemoryStore {
    fn entities(&self) -> BoxFuture<'_, PersistenceResult<Vec<Entity>>> {
        Box::pin(ready(Ok(self.entities_now())))
    }

    fn entity(&self, id: EntityId) -> BoxFuture<'_, PersistenceResult<Option<Entity>>> {
        Box::pin(ready(Ok(self.entity_now(id))))
    }

    fn update_entity_status(
        &self,
        id: EntityId,
        status: EntityStatus,
    ) -> BoxFuture<'_, PersistenceResult<()>> {
        Box::pin(ready(self.update_status_now(id, status)))
    }

    fn update_entity_analytics(
        &self,
        id: EntityId,
        analytics: EntityAnalytics,
    ) -> BoxFuture<'_, PersistenceResult<()>> {
        Box::pin(ready(self.update_analytics_now(id, analytics)))
    }

    fn insert_reading(&self, reading: Reading) -> BoxFuture<'_, PersistenceResult<()>> {
        Box::pin(ready(self.insert_reading_now(reading)))
    }

    fn latest_reading(&self, id: EntityId) -> BoxFuture<'_, PersistenceResult<Option<Reading>>> {
        Box::pin(ready(Ok(self.latest_reading_now(id))))
    }

    fn readings_in_range(
        &self,
        id: EntityId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BoxFuture<'_, PersistenceResult<Vec<Reading>>> {
        Box::pin(ready(Ok(self.readings_in_range_now(id, from, to))))
    }

    fn insert_plan(&self, plan: SignalTimingPlan) -> BoxFuture<'_, PersistenceResult<()>> {
        Box::pin(ready(self.insert_plan_now(plan)))
    }

    fn latest_plan(
        &self,
        id: EntityId,
    ) -> BoxFuture<'_, PersistenceResult<Option<SignalTimingPlan>>> {
        Box::pin(ready(Ok(self.latest_plan_now(id))))
    }

    fn insert_predictions(&self, set: PredictionSet) -> BoxFuture<'_, PersistenceResult<()>> {
        Box::pin(ready(self.insert_predictions_now(set)))
    }

    fn save_health_record(&self, record: HealthRecord) -> BoxFuture<'_, PersistenceResult<()>> {
        Box::pin(ready(self.save_health_now(record)))
    }

    fn insert_event(&self, event: HealthEvent) -> BoxFuture<'_, PersistenceResult<()>> {
        Box::pin(ready(self.insert_event_now(event)))
    }

    fn events_in_range(
        &self,
        id: Option<EntityId>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BoxFuture<'_, PersistenceResult<Vec<HealthEvent>>> {
        Box::pin(ready(Ok(self.events_in_range_now(id, from, to))))
    }

    fn record_activity(&self, entry: ActivityEntry) -> BoxFuture<'_, PersistenceResult<()>> {
        Box::pin(ready(self.record_activity_now(entry)))
    }

    fn provision(&self, entities: Vec<Entity>) -> BoxFuture<'_, PersistenceResult<usize>> {
        Box::pin(ready(Ok(self.provision_now(entities))))
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("MemoryStore")
            .field("entities", &tables.entities.len())
            .field("events", &tables.events.len())
            .field("writes", &self.write_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tflow_core::{CongestionLevel, CycleKind, EntityKind, GeoPoint, Provenance, Severity};

    fn entity(id: u64) -> Entity {
        Entity::new(
            EntityId::new(id),
            EntityKind::Intersection,
            format!("Intersection {id}"),
            GeoPoint {
                lat: 40.0,
                lon: -73.0,
            },
        )
    }

    fn reading(id: u64, at: DateTime<Utc>, vehicle_count: u32) -> Reading {
        Reading {
            entity_id: EntityId::new(id),
            vehicle_count,
            avg_speed: 30.0,
            congestion: CongestionLevel::from_vehicle_count(vehicle_count),
            confidence: 0.8,
            provenance: Provenance::Synthetic,
            weather: None,
            recorded_at: at,
        }
    }

    #[tokio::test]
    async fn test_entities_ordered_and_updatable() {
        let store = MemoryStore::with_entities([entity(3), entity(1), entity(2)]);
        let ids: Vec<u64> = store
            .entities()
            .await
            .unwrap()
            .iter()
            .map(|e| e.id.value())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);

        store
            .update_entity_status(EntityId::new(2), EntityStatus::Maintenance)
            .await
            .unwrap();
        let updated = store.entity(EntityId::new(2)).await.unwrap().unwrap();
        assert_eq!(updated.status, EntityStatus::Maintenance);

        let missing = store
            .update_entity_status(EntityId::new(99), EntityStatus::Active)
            .await;
        assert!(matches!(missing, Err(PersistenceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_latest_and_range_queries() {
        let store = MemoryStore::new();
        let base = Utc::now();
        // Inserted out of order on purpose.
        for (offset, count) in [(2, 30), (0, 10), (1, 20)] {
            store
                .insert_reading(reading(1, base + Duration::minutes(offset), count))
                .await
                .unwrap();
        }

        let latest = store.latest_reading(EntityId::new(1)).await.unwrap().unwrap();
        assert_eq!(latest.vehicle_count, 30);

        let range = store
            .readings_in_range(EntityId::new(1), base, base + Duration::minutes(2))
            .await
            .unwrap();
        let counts: Vec<u32> = range.iter().map(|r| r.vehicle_count).collect();
        assert_eq!(counts, vec![10, 20]);

        assert!(store.latest_reading(EntityId::new(2)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryStore::with_entities([entity(1), entity(2)]);
        store.fail_entity(EntityId::new(1));

        let now = Utc::now();
        assert!(store.insert_reading(reading(1, now, 5)).await.is_err());
        assert!(store.insert_reading(reading(2, now, 5)).await.is_ok());

        store.heal_entity(EntityId::new(1));
        assert!(store.insert_reading(reading(1, now, 5)).await.is_ok());

        store.set_fail_writes(true);
        assert!(matches!(
            store.insert_reading(reading(2, now, 5)).await,
            Err(PersistenceError::Unavailable(_))
        ));
        assert_eq!(store.write_count(), 2);
    }

    #[test]
    fn test_futures_resolve_without_runtime() {
        let store = MemoryStore::with_entities([entity(1)]);
        let now = Utc::now();

        tokio_test::assert_ok!(tokio_test::block_on(store.insert_reading(reading(1, now, 12))));
        let latest = tokio_test::block_on(store.latest_reading(EntityId::new(1)));
        assert_eq!(tokio_test::assert_ok!(latest).map(|r| r.vehicle_count), Some(12));
    }

    #[tokio::test]
    async fn test_history_is_bounded_per_entity() {
        let store = MemoryStore::with_retention(Retention {
            rows_per_entity: 5,
            log_entries: 3,
        });
        let base = Utc::now();
        for i in 0..3000u32 {
            store
                .insert_reading(reading(1, base + Duration::seconds(i64::from(i)), i))
                .await
                .unwrap();
        }
        store.insert_reading(reading(2, base, 7)).await.unwrap();

        let kept = store.readings_in_range_now(
            EntityId::new(1),
            base - Duration::days(1),
            base + Duration::days(1),
        );
        let counts: Vec<u32> = kept.iter().map(|r| r.vehicle_count).collect();
        assert_eq!(counts, vec![2995, 2996, 2997, 2998, 2999]);
        assert_eq!(store.latest_reading_now(EntityId::new(1)).unwrap().vehicle_count, 2999);

        // Another entity's history is untouched.
        assert_eq!(store.latest_reading_now(EntityId::new(2)).unwrap().vehicle_count, 7);

        // A late row older than everything retained is dropped at once.
        store
            .insert_reading(reading(1, base - Duration::hours(1), 1))
            .await
            .unwrap();
        assert_eq!(store.latest_reading_now(EntityId::new(1)).unwrap().vehicle_count, 2999);
        assert_eq!(
            store
                .readings_in_range_now(EntityId::new(1), base - Duration::days(1), base)
                .len(),
            0
        );

        for i in 0..10 {
            store
                .record_activity(ActivityEntry::new(
                    CycleKind::TrafficRefresh,
                    None,
                    Severity::Warning,
                    format!("entry {i}"),
                ))
                .await
                .unwrap();
        }
        let activity = store.activity_now();
        assert_eq!(activity.len(), 3);
        assert_eq!(activity[0].message, "entry 7");
        assert_eq!(activity[2].message, "entry 9");
    }
}
