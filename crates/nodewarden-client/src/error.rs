//! Errors surfaced to the parent process by [`crate::CoordinatorHandle`].

use nodewarden_ports::{IpcError, ProcessError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("ipc failure: {0}")]
    Ipc(#[from] IpcError),

    #[error("process failure: {0}")]
    Process(#[from] ProcessError),

    /// An admin request the coordinator serviced and rejected (spec §7:
    /// recovered locally, reported to the requester as text).
    #[error("{0}")]
    Remote(String),

    #[error("timed out waiting for a reply")]
    Timeout,
}
