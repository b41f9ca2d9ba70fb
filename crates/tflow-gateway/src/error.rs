//! Gateway error types.
//!
//! Only client construction can fail. Request failures are reported as
//! `GatewayOutcome::Unavailable`, never as errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Invalid base URL: {0}")]
    InvalidUrl(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;
