//! Refresh scheduler.
//!
//! Four independent cadences (traffic, camera, analytics, health). Each
//! tick runs one cycle over the current entities:
//!
//! ```text
//! tick ─▶ SingleFlight ─▶ for each entity (under its EntityLock):
//!                            Gateway ──Unavailable──▶ FallbackEngine
//!                               │                         │
//!                               └──────────┬──────────────┘
//!                                          ▼
//!                              Storage (best effort) ─▶ BroadcastHub
//! ```
//!
//! A tick arriving while the same cadence is still running is skipped.
//! One entity failing never aborts the rest of the cycle.

mod cadence;
pub mod config;
pub mod error;
pub mod locks;
pub mod report;
pub mod scheduler;
pub mod single_flight;

pub use config::SchedulerConfig;
pub use error::{SchedulerError, SchedulerResult};
pub use locks::EntityLocks;
pub use report::{CycleOutcome, CycleReport};
pub use scheduler::{RefreshScheduler, Services};
pub use single_flight::{FlightGuard, SingleFlight};
