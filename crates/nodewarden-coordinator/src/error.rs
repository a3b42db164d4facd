//! Error types for the coordinator state machine.

use nodewarden_ports::{DbError, HaErrorKind, IpcError};
use thiserror::Error;

/// Errors that can end a coordinator's run loop. Every variant maps onto
/// the wire `HaErrorKind` taxonomy (see [`CoordinatorError::kind`]) when
/// reported to the parent.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("database error: {0}")]
    Database(#[from] DbError),

    #[error("ipc error: {0}")]
    Ipc(#[from] IpcError),

    /// Mixed mode, duplicate name, foreign session id, or a standalone
    /// node registering while a cluster peer is active — terminal.
    #[error("policy violation: {0}")]
    PolicyViolation(String),

    /// The coordinator has already entered `HaStatus::Error`; no further
    /// transitions are permitted.
    #[error("coordinator is in the error state: {0}")]
    Terminal(String),
}

impl CoordinatorError {
    /// Maps this error onto the wire error taxonomy; used when reporting
    /// a terminal condition to the parent before exiting.
    #[must_use]
    pub fn kind(&self) -> HaErrorKind {
        match self {
            CoordinatorError::Database(DbError::Down) => HaErrorKind::TransientDatabase,
            CoordinatorError::Database(DbError::Fail(_)) => HaErrorKind::TerminalDatabase,
            CoordinatorError::Ipc(_) => HaErrorKind::IpcFailure,
            CoordinatorError::PolicyViolation(_) | CoordinatorError::Terminal(_) => HaErrorKind::PolicyViolation,
        }
    }

    /// Whether this error requires the coordinator to enter `Error` and
    /// stop making transitions (everything but a transient DOWN).
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CoordinatorError::Database(DbError::Down))
    }
}

/// Result type for coordinator operations.
pub type Result<T> = std::result::Result<T, CoordinatorError>;
