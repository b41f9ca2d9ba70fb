//! Health state tracker for monitored entities.
//!
//! State machine per entity over {active, error, offline, maintenance},
//! driven only by probe outcomes:
//! - success while error/offline → active, `connection_restored`
//! - failure count above the threshold → error, `connection_lost`
//! - maintenance is set externally and never left because of a probe
//!
//! Each entity's record is mutated under its own map shard lock, so
//! concurrent probes of one entity never race on the failure counter.

pub mod config;
pub mod error;
pub mod probe;
pub mod tracker;

pub use config::{HealthConfig, SimulatedRates};
pub use error::{HealthError, HealthResult};
pub use probe::{BoxFuture, HttpProber, Prober, SimulatedProber};
pub use tracker::{HealthTracker, ProbeOutcome, ProbeReport};
