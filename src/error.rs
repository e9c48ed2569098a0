use thiserror::Error;

use crate::recurrence::RecurrenceError;

/// Failures of the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },

    #[error("task {0} was modified concurrently")]
    Conflict(u64),

    #[error("failed to access database file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode or decode database: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by task operations.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("invalid recurrence: {0}")]
    InvalidRecurrence(#[from] RecurrenceError),

    #[error("task {0} not found")]
    NotFound(u64),

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for TaskError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { kind: "task", id } => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}
