//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] tflow_core::CoreError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] tflow_gateway::GatewayError),

    #[error("Health error: {0}")]
    Health(#[from] tflow_health::HealthError),

    #[error("Hub error: {0}")]
    Hub(#[from] tflow_hub::HubError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] tflow_telemetry::TelemetryError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] tflow_persistence::PersistenceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
