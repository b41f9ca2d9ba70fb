//! Telemetry refresh and distribution engine.
//!
//! Wires the services together and runs them:
//! - JSON-Lines backed store, provisioned from configuration
//! - Gateway to the optimization service with local fallback
//! - Health tracker and prober
//! - Broadcast hub and its WebSocket server
//! - Refresh scheduler cadences

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::{AppConfig, EntitySeed, PersistenceConfig};
pub use error::{AppError, AppResult};
