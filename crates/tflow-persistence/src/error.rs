//! Persistence error types.

use thiserror::Error;

use tflow_core::EntityId;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Entity not found: {0}")]
    NotFound(EntityId),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;
