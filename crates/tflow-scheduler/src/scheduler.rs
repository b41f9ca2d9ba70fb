//! Cycle execution.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use tflow_core::{
    ActivityEntry, CycleKind, Entity, EntityAnalytics, EntityKind, PredictionSet, Provenance,
    Reading, Severity, SignalTimingPlan, Topic,
};
use tflow_fallback::FallbackEngine;
use tflow_gateway::{Gateway, GatewayOutcome};
use tflow_health::{HealthTracker, Prober};
use tflow_hub::{BroadcastHub, EntitySummary, HubMessage};
use tflow_persistence::Storage;
use tflow_telemetry::Metrics;

use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, SchedulerResult};
use crate::locks::EntityLocks;
use crate::report::{CycleOutcome, CycleReport};
use crate::single_flight::SingleFlight;

/// Collaborators handed to the scheduler, constructed once at startup.
#[derive(Clone)]
pub struct Services {
    pub storage: Arc<dyn Storage>,
    pub gateway: Arc<dyn Gateway>,
    pub fallback: Arc<FallbackEngine>,
    pub health: Arc<HealthTracker>,
    pub prober: Arc<dyn Prober>,
    pub hub: Arc<BroadcastHub>,
}

/// What processing one entity produced.
struct EntityUpdate {
    /// `None` for health probes, which carry no data provenance.
    provenance: Option<Provenance>,
}

/// Runs refresh cycles.
pub struct RefreshScheduler {
    pub(crate) config: SchedulerConfig,
    services: Services,
    traffic: SingleFlight,
    camera: SingleFlight,
    analytics: SingleFlight,
    health: SingleFlight,
    locks: EntityLocks,
}

impl RefreshScheduler {
    pub fn new(config: SchedulerConfig, services: Services) -> Self {
        Self {
            config,
            services,
            traffic: SingleFlight::new(),
            camera: SingleFlight::new(),
            analytics: SingleFlight::new(),
            health: SingleFlight::new(),
            locks: EntityLocks::new(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    fn flight(&self, kind: CycleKind) -> &SingleFlight {
        match kind {
            CycleKind::TrafficRefresh => &self.traffic,
            CycleKind::CameraRefresh => &self.camera,
            CycleKind::Analytics => &self.analytics,
            CycleKind::HealthProbe => &self.health,
        }
    }

    /// Whether a cycle of this kind is executing right now.
    pub fn is_running(&self, kind: CycleKind) -> bool {
        self.flight(kind).is_running()
    }

    /// Run one cycle over the current entities.
    ///
    /// Skipped if the same kind is already running. Per-entity failures are
    /// counted in the report and never abort the cycle.
    pub async fn run_cycle(&self, kind: CycleKind) -> CycleOutcome {
        let Some(_flight) = self.flight(kind).try_acquire() else {
            Metrics::cycle_skipped(kind);
            info!(cycle = %kind, "Cycle still running, tick skipped");
            return CycleOutcome::Skipped;
        };

        let started = Instant::now();
        let mut report = CycleReport::new(kind);

        let entities = match self.services.storage.entities().await {
            Ok(entities) => entities,
            Err(e) => {
                error!(cycle = %kind, error = %e, "Failed to load entities");
                self.record_activity(kind, None, Severity::Error, format!("entity load failed: {e}"))
                    .await;
                report.duration = started.elapsed();
                return CycleOutcome::Completed(report);
            }
        };

        let targets: Vec<&Entity> = entities.iter().filter(|e| selects(kind, e)).collect();
        debug!(cycle = %kind, entities = targets.len(), "Cycle started");

        for entity in targets {
            match self.process(kind, entity).await {
                Ok(update) => {
                    report.updated += 1;
                    if let Some(provenance) = update.provenance {
                        Metrics::entity_updated(kind, provenance);
                        if provenance.is_fallback() {
                            report.fallbacks += 1;
                        }
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    Metrics::entity_failed(kind, e.reason());
                    warn!(cycle = %kind, entity_id = %entity.id, error = %e, "Entity update failed");
                    self.record_activity(kind, Some(entity), Severity::Error, e.to_string())
                        .await;
                }
            }
        }

        if kind == CycleKind::HealthProbe {
            Metrics::entity_status_counts(&self.services.health.status_counts());
        }
        if report.processed() > 0 {
            self.publish_bulk_snapshot(kind).await;
        }

        report.duration = started.elapsed();
        let duration_ms = report.duration.as_secs_f64() * 1000.0;
        Metrics::cycle_completed(kind, duration_ms);
        info!(
            cycle = %kind,
            updated = report.updated,
            failed = report.failed,
            fallbacks = report.fallbacks,
            duration_ms,
            "Cycle completed"
        );

        CycleOutcome::Completed(report)
    }

    async fn process(&self, kind: CycleKind, entity: &Entity) -> SchedulerResult<EntityUpdate> {
        let _lock = self.locks.lock(entity.id).await;
        match kind {
            CycleKind::TrafficRefresh | CycleKind::CameraRefresh => {
                self.refresh_reading(entity).await
            }
            CycleKind::Analytics => self.refresh_analytics(entity).await,
            CycleKind::HealthProbe => self.probe_health(entity).await,
        }
    }

    /// Detection → reading, or a synthetic reading when the service is
    /// unavailable.
    async fn refresh_reading(&self, entity: &Entity) -> SchedulerResult<EntityUpdate> {
        let now = Utc::now();
        let reading = match self
            .services
            .gateway
            .detect(entity.id, entity.feed_ref())
            .await
        {
            GatewayOutcome::Available(detection) => detection.into_reading(entity.id, now),
            GatewayOutcome::Unavailable => {
                debug!(entity_id = %entity.id, "Gateway unavailable, synthetic reading");
                self.services.fallback.synthetic_reading(entity.id, now)
            }
        };
        let provenance = reading.provenance;

        let persisted = self.persist_reading(entity, &reading).await;
        self.services.hub.publish(
            Topic::Entity(entity.id),
            HubMessage::ReadingUpdate { reading },
        );
        persisted?;

        Ok(EntityUpdate {
            provenance: Some(provenance),
        })
    }

    async fn persist_reading(&self, entity: &Entity, reading: &Reading) -> SchedulerResult<()> {
        self.services.storage.insert_reading(reading.clone()).await?;
        self.update_analytics(entity, |analytics| {
            analytics.last_refreshed_at = Some(reading.recorded_at);
            analytics.vehicle_count = Some(reading.vehicle_count);
            analytics.avg_speed = Some(reading.avg_speed);
            analytics.congestion = Some(reading.congestion);
        })
        .await
    }

    /// Signal plan and forecast from the latest reading.
    async fn refresh_analytics(&self, entity: &Entity) -> SchedulerResult<EntityUpdate> {
        let services = &self.services;
        let now = Utc::now();

        let reading = match services.storage.latest_reading(entity.id).await {
            Ok(Some(reading)) => reading,
            Ok(None) => services.fallback.synthetic_reading(entity.id, now),
            Err(e) => {
                warn!(entity_id = %entity.id, error = %e, "Latest reading unavailable, using synthetic");
                services.fallback.synthetic_reading(entity.id, now)
            }
        };

        let plan = match services.gateway.optimize(entity.id, &reading).await {
            GatewayOutcome::Available(timing) => timing.into_plan(entity.id, now),
            GatewayOutcome::Unavailable => services.fallback.timing(&reading, now),
        };

        let horizon = self.config.prediction_horizon_hours;
        let predictions = match services.gateway.predict(entity.id, horizon).await {
            GatewayOutcome::Available(forecast) => forecast.into_prediction_set(entity.id, now),
            GatewayOutcome::Unavailable => {
                services.fallback.synthetic_predictions(entity.id, horizon, now)
            }
        };

        let provenance = if plan.provenance.is_fallback() {
            plan.provenance
        } else {
            predictions.provenance
        };

        let persisted = self.persist_analytics(entity, &plan, &predictions).await;
        services.hub.publish(
            Topic::Entity(entity.id),
            HubMessage::AnalyticsUpdate {
                entity_id: entity.id,
                plan,
                predictions,
            },
        );
        persisted?;

        Ok(EntityUpdate {
            provenance: Some(provenance),
        })
    }

    async fn persist_analytics(
        &self,
        entity: &Entity,
        plan: &SignalTimingPlan,
        predictions: &PredictionSet,
    ) -> SchedulerResult<()> {
        let storage = &self.services.storage;
        storage.insert_plan(plan.clone()).await?;
        storage.insert_predictions(predictions.clone()).await?;
        self.update_analytics(entity, |analytics| {
            analytics.last_refreshed_at = Some(plan.created_at);
            analytics.plan_provenance = Some(plan.provenance);
        })
        .await
    }

    /// Probe, fold into the tracker, persist what changed.
    async fn probe_health(&self, entity: &Entity) -> SchedulerResult<EntityUpdate> {
        let services = &self.services;
        services.health.sync_external(entity.id, entity.status);

        // Probe against the tracker's view, the stored status may lag.
        let mut target = entity.clone();
        if let Some(status) = services.health.status(entity.id) {
            target.status = status;
        }

        let outcome = services.prober.probe(&target).await;
        let report = services.health.record_probe(entity.id, outcome, Utc::now());

        let persisted = async {
            services
                .storage
                .save_health_record(report.record.clone())
                .await?;
            if report.status != entity.status {
                services
                    .storage
                    .update_entity_status(entity.id, report.status)
                    .await?;
            }
            if let Some(event) = &report.event {
                services.storage.insert_event(event.clone()).await?;
            }
            Ok::<(), SchedulerError>(())
        }
        .await;

        services.hub.publish(
            Topic::Entity(entity.id),
            HubMessage::HealthUpdate {
                entity_id: entity.id,
                status: report.status,
                quality: report.quality,
                record: report.record,
                event: report.event,
            },
        );
        persisted?;

        Ok(EntityUpdate { provenance: None })
    }

    /// Read-modify-write of the analytics fields on the freshest copy.
    async fn update_analytics(
        &self,
        entity: &Entity,
        apply: impl FnOnce(&mut EntityAnalytics),
    ) -> SchedulerResult<()> {
        let storage = &self.services.storage;
        let current = storage
            .entity(entity.id)
            .await?
            .ok_or(SchedulerError::EntityMissing(entity.id))?;
        let mut analytics = current.analytics;
        apply(&mut analytics);
        storage.update_entity_analytics(entity.id, analytics).await?;
        Ok(())
    }

    async fn publish_bulk_snapshot(&self, kind: CycleKind) {
        let entities = match self.services.storage.entities().await {
            Ok(entities) => entities,
            Err(e) => {
                warn!(cycle = %kind, error = %e, "Bulk snapshot skipped");
                return;
            }
        };
        let summaries = entities.iter().map(EntitySummary::from).collect();
        self.services.hub.publish(
            Topic::Global,
            HubMessage::BulkSnapshot {
                cycle: kind,
                entities: summaries,
                at: Utc::now(),
            },
        );
    }

    /// Best effort: a failing activity write is logged and dropped.
    async fn record_activity(
        &self,
        kind: CycleKind,
        entity: Option<&Entity>,
        severity: Severity,
        message: String,
    ) {
        let entry = ActivityEntry::new(kind, entity.map(|e| e.id), severity, message);
        if let Err(e) = self.services.storage.record_activity(entry).await {
            error!(cycle = %kind, error = %e, "Failed to record activity entry");
        }
    }
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Which entities a cycle processes.
fn selects(kind: CycleKind, entity: &Entity) -> bool {
    match kind {
        CycleKind::TrafficRefresh | CycleKind::Analytics => {
            entity.kind == EntityKind::Intersection && entity.is_active()
        }
        CycleKind::CameraRefresh => entity.kind == EntityKind::Camera && entity.is_active(),
        CycleKind::HealthProbe => true,
    }
}
