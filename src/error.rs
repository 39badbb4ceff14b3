//! Error types for taskalloc.

use thiserror::Error;

use crate::model::TaskStatus;
use crate::policy::Gate;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// An employee failed the availability gate. Names which gate so the
    /// caller can tell "performance below floor" from "fully loaded".
    #[error("employee {name} is ineligible: {gate}")]
    IneligibleEmployee { name: String, gate: Gate },

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    /// Business-level ownership violation, not authentication.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The task's status no longer matches the status the command was
    /// issued against. Retry only after re-reading.
    #[error("conflicting update: expected status {expected}, found {actual}")]
    ConflictingUpdate {
        expected: TaskStatus,
        actual: TaskStatus,
    },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
