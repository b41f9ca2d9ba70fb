//! Hub errors.

use thiserror::Error;

use crate::hub::ClientId;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("Unknown client: {0}")]
    UnknownClient(ClientId),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}

pub type HubResult<T> = Result<T, HubError>;
