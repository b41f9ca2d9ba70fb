//! Prometheus metrics for the tflow engine.
//!
//! Covers:
//! - Refresh cycles (completed, skipped, duration)
//! - Per-entity updates and failures
//! - External gateway requests
//! - Health transitions and entity status counts
//! - Broadcast hub delivery
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, which is a programming error that should
//! crash at first use rather than silently drop metrics.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_gauge, register_int_gauge_vec,
    CounterVec, Encoder, HistogramVec, IntGauge, IntGaugeVec, TextEncoder,
};

use tflow_core::{CycleKind, EntityStatus, EventKind, Provenance};

use crate::error::{TelemetryError, TelemetryResult};

/// Completed refresh cycles.
pub static CYCLES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tflow_cycles_total",
        "Total completed refresh cycles",
        &["cycle"]
    )
    .unwrap()
});

/// Cycle triggers skipped because the previous run was still in flight.
pub static CYCLES_SKIPPED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tflow_cycles_skipped_total",
        "Cycle triggers skipped by the single-flight guard",
        &["cycle"]
    )
    .unwrap()
});

/// Cycle duration in milliseconds.
pub static CYCLE_DURATION_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "tflow_cycle_duration_ms",
        "Refresh cycle duration in milliseconds",
        &["cycle"],
        vec![10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 10000.0, 30000.0, 60000.0]
    )
    .unwrap()
});

/// Successful entity updates by provenance.
pub static ENTITY_UPDATES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tflow_entity_updates_total",
        "Entities updated per cycle, by provenance of the result",
        &["cycle", "provenance"]
    )
    .unwrap()
});

/// Per-entity failures inside a cycle.
pub static ENTITY_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tflow_entity_failures_total",
        "Per-entity failures inside refresh cycles",
        &["cycle", "reason"]
    )
    .unwrap()
});

/// Gateway requests by kind and outcome.
pub static GATEWAY_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tflow_gateway_requests_total",
        "External gateway requests",
        &["kind", "outcome"]
    )
    .unwrap()
});

/// Gateway latency in milliseconds.
pub static GATEWAY_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "tflow_gateway_latency_ms",
        "External gateway request latency in milliseconds",
        &["kind"],
        vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2000.0, 5000.0]
    )
    .unwrap()
});

/// Health transitions emitted by the tracker.
pub static HEALTH_TRANSITIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tflow_health_transitions_total",
        "Health status transitions",
        &["kind"]
    )
    .unwrap()
});

/// Number of entities per status.
pub static ENTITY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "tflow_entity_status",
        "Number of entities in each status",
        &["status"]
    )
    .unwrap()
});

/// Hub deliveries by outcome (delivered / dropped).
pub static HUB_DELIVERIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "tflow_hub_deliveries_total",
        "Broadcast hub deliveries",
        &["outcome"]
    )
    .unwrap()
});

/// Registered hub clients.
pub static HUB_CLIENTS: Lazy<IntGauge> =
    Lazy::new(|| register_int_gauge!("tflow_hub_clients", "Registered hub clients").unwrap());

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record a completed cycle.
    pub fn cycle_completed(cycle: CycleKind, duration_ms: f64) {
        CYCLES_TOTAL.with_label_values(&[cycle.as_str()]).inc();
        CYCLE_DURATION_MS
            .with_label_values(&[cycle.as_str()])
            .observe(duration_ms);
    }

    /// Record a skipped cycle trigger.
    pub fn cycle_skipped(cycle: CycleKind) {
        CYCLES_SKIPPED_TOTAL
            .with_label_values(&[cycle.as_str()])
            .inc();
    }

    /// Record one entity updated.
    pub fn entity_updated(cycle: CycleKind, provenance: Provenance) {
        ENTITY_UPDATES_TOTAL
            .with_label_values(&[cycle.as_str(), provenance.as_str()])
            .inc();
    }

    /// Record one entity failure.
    pub fn entity_failed(cycle: CycleKind, reason: &str) {
        ENTITY_FAILURES_TOTAL
            .with_label_values(&[cycle.as_str(), reason])
            .inc();
    }

    /// Record a gateway request.
    pub fn gateway_request(kind: &str, available: bool, latency_ms: f64) {
        let outcome = if available { "available" } else { "unavailable" };
        GATEWAY_REQUESTS_TOTAL
            .with_label_values(&[kind, outcome])
            .inc();
        GATEWAY_LATENCY_MS
            .with_label_values(&[kind])
            .observe(latency_ms);
    }

    /// Record a health transition.
    pub fn health_transition(kind: EventKind) {
        HEALTH_TRANSITIONS_TOTAL
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    /// Set the per-status entity counts.
    ///
    /// Statuses missing from `counts` are reset to zero.
    pub fn entity_status_counts(counts: &[(EntityStatus, i64)]) {
        for status in EntityStatus::ALL {
            let count = counts
                .iter()
                .find(|(s, _)| *s == status)
                .map(|(_, c)| *c)
                .unwrap_or(0);
            ENTITY_STATUS.with_label_values(&[status.as_str()]).set(count);
        }
    }

    /// Record hub deliveries.
    pub fn hub_delivered(count: u64) {
        HUB_DELIVERIES_TOTAL
            .with_label_values(&["delivered"])
            .inc_by(count as f64);
    }

    /// Record dropped hub deliveries (full or closed client queue).
    pub fn hub_dropped(count: u64) {
        HUB_DELIVERIES_TOTAL
            .with_label_values(&["dropped"])
            .inc_by(count as f64);
    }

    /// Set the registered hub client count.
    pub fn hub_clients(count: usize) {
        HUB_CLIENTS.set(count as i64);
    }
}

/// Render all registered metrics in the Prometheus text format.
pub fn render_metrics() -> TelemetryResult<String> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&families, &mut buffer)
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
}
