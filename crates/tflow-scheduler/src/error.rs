//! Scheduler error types.
//!
//! These describe a single entity failing inside a cycle. They are logged,
//! recorded as activity entries and counted; they never escape a cycle.

use thiserror::Error;

use tflow_core::EntityId;
use tflow_persistence::PersistenceError;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Entity {0} no longer exists")]
    EntityMissing(EntityId),
}

impl SchedulerError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Persistence(_) => "persistence",
            Self::EntityMissing(_) => "missing",
        }
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
