//! Health crate errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

pub type HealthResult<T> = Result<T, HealthError>;
