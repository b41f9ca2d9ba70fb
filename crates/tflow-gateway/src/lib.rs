//! External gateway for the optimization / detection / prediction service.
//!
//! Every call is bounded by a timeout and returns a two-variant
//! [`GatewayOutcome`]: `Available(data)` or `Unavailable`. Timeouts,
//! transport errors and non-success responses all collapse into
//! `Unavailable`; callers branch on availability only. There are no
//! retries here: the next scheduler cycle is the retry.

pub mod client;
pub mod config;
pub mod error;
pub mod mock;
pub mod types;

pub use client::HttpGateway;
pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use mock::MockGateway;
pub use types::{
    BoxFuture, DetectResponse, EnrichedData, EnrichmentRequest, Gateway, GatewayOutcome,
    OptimizeResponse, PredictResponse, RequestKind, WirePrediction,
};
