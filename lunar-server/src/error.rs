//! Errors raised by the execution core

use lunar_core::domain::job::JobStatus;
use thiserror::Error;

/// Service error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("job {0} not found")]
    NotFound(u64),

    #[error("job {id} can't be cancelled in status {status}")]
    CannotCancel { id: u64, status: JobStatus },

    #[error("code can't be executed: {0}")]
    CannotExecute(String),

    #[error("no such property: {0}")]
    NoSuchProperty(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}
