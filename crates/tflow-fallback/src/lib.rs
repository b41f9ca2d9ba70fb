//! Fallback decision engine.
//!
//! Produces locally computed substitutes when the external gateway is
//! unavailable, so every cycle yields a usable result:
//! - `rule_based_timing`: deterministic signal timing from a reading
//! - `FallbackEngine::synthetic_reading`: plausible randomized reading
//! - `FallbackEngine::synthetic_predictions`: time-of-day traffic forecast
//!
//! Randomness comes from an injected RNG so tests can seed it.

pub mod config;
pub mod engine;
pub mod prediction;
pub mod timing;

pub use config::FallbackConfig;
pub use engine::FallbackEngine;
pub use prediction::TimeOfDay;
pub use timing::{rule_based_timing, BASE_GREEN_SECS, BASE_RED_SECS, YELLOW_SECS};
