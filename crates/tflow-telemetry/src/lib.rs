//! Prometheus metrics and structured logging for tflow.
//!
//! - Prometheus metrics for refresh cycles, gateway calls, health
//!   transitions and broadcast delivery
//! - Structured logging with tracing (JSON in production)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::{render_metrics, Metrics};
