//! Error types for tflow-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid entity id: {0}")]
    InvalidEntityId(String),

    #[error("Invalid congestion level: {0}")]
    InvalidCongestionLevel(u8),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
