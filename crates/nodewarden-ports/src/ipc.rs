//! The parent-process/coordinator IPC transport contract (spec §1: out
//! of scope, referenced only by the interface it exposes).
//!
//! [`HaMessage`] mirrors the wire message table 1:1; [`IpcTransport`] is
//! the only genuinely asynchronous boundary in this crate (message
//! delivery is the real suspension point, unlike the blocking database
//! calls in [`crate::db`]).

use std::time::Duration;

use nodewarden_types::{HaStatus, NodeId};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// The taxonomy of error conditions a coordinator can report back to its
/// parent, replacing free-form error strings on the wire (spec's
/// REDESIGN FLAGS: discriminated error codes over ad hoc messages).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaErrorKind {
    /// DOWN: step abandoned, no state change, retried on a shortened cadence.
    TransientDatabase,
    /// FAIL: coordinator transitions to ERROR and exits.
    TerminalDatabase,
    /// Mixed mode, duplicate name, foreign session id, active standalone
    /// in cluster mode — terminal, operator must resolve before restart.
    PolicyViolation,
    /// Recovered locally; reported to the requester, coordinator continues.
    AdminRequest,
    /// Fatal for both ends of the channel.
    IpcFailure,
}

impl HaErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HaErrorKind::TransientDatabase => "transient_database",
            HaErrorKind::TerminalDatabase => "terminal_database",
            HaErrorKind::PolicyViolation => "policy_violation",
            HaErrorKind::AdminRequest => "admin_request",
            HaErrorKind::IpcFailure => "ipc_failure",
        }
    }

    /// Whether this error kind forces the coordinator into `HaStatus::Error`.
    #[must_use]
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            HaErrorKind::TerminalDatabase | HaErrorKind::PolicyViolation | HaErrorKind::IpcFailure
        )
    }
}

/// A wire message exchanged between the parent process and the
/// coordinator. Variant names match the original message catalog
/// (`ZBX_IPC_HA_*`).
#[derive(Debug, Clone)]
pub enum HaMessage {
    Register,
    /// Push updated status/failover-delay/error, or poll with no change
    /// (an empty request) waiting for the coordinator's latest verdict.
    UpdateRequest {
        status: Option<HaStatus>,
        failover_delay_secs: Option<i64>,
        error: Option<(HaErrorKind, String)>,
    },
    UpdateReply {
        status: HaStatus,
        failover_delay_secs: i64,
        error: Option<(HaErrorKind, String)>,
    },
    Heartbeat,
    Pause,
    Stop,
    GetNodesRequest,
    GetNodesReply {
        ok: bool,
        body: String,
    },
    RemoveNodeRequest {
        index: usize,
    },
    RemoveNodeReply {
        error: Option<(HaErrorKind, String)>,
    },
    SetFailoverDelayRequest {
        delay_secs: i64,
    },
    SetFailoverDelayReply {
        error: Option<(HaErrorKind, String)>,
    },
    LogLevelIncrease,
    LogLevelDecrease,
}

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("peer disconnected")]
    Disconnected,
    #[error("timed out waiting for a reply")]
    Timeout,
}

/// Identifies which node a [`HaMessage`] concerns, for transports that
/// multiplex several coordinators (unused by the single-coordinator
/// in-process deployment, needed once several run behind one parent).
pub type Addressee = Option<NodeId>;

/// An asynchronous duplex message channel between a parent process and a
/// coordinator.
#[async_trait::async_trait]
pub trait IpcTransport: Send + Sync {
    async fn send(&mut self, message: HaMessage) -> Result<(), IpcError>;

    /// Waits up to `timeout` for the next message; `None` on timeout
    /// rather than an error, matching `zbx_ipc_socket_read`'s
    /// poll-with-timeout semantics used by `recv_status`.
    async fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<HaMessage>, IpcError>;
}

/// An in-memory [`IpcTransport`] built on a pair of `tokio::sync::mpsc`
/// channels, used by tests and by in-process (same-binary) deployment.
pub struct ChannelTransport {
    tx: mpsc::Sender<HaMessage>,
    rx: mpsc::Receiver<HaMessage>,
}

impl ChannelTransport {
    async fn send(&mut self, message: HaMessage) -> Result<(), IpcError> {
        self.tx.send(message).await.map_err(|_| IpcError::Disconnected)
    }

    async fn recv_timeout(&mut self, duration: Duration) -> Result<Option<HaMessage>, IpcError> {
        match timeout(duration, self.rx.recv()).await {
            Ok(Some(message)) => Ok(Some(message)),
            Ok(None) => Err(IpcError::Disconnected),
            Err(_) => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl IpcTransport for ChannelTransport {
    async fn send(&mut self, message: HaMessage) -> Result<(), IpcError> {
        ChannelTransport::send(self, message).await
    }

    async fn recv_timeout(&mut self, duration: Duration) -> Result<Option<HaMessage>, IpcError> {
        ChannelTransport::recv_timeout(self, duration).await
    }
}

/// Builds a connected pair of [`ChannelTransport`]s — one end for the
/// parent, one for the coordinator.
#[must_use]
pub fn channel_pair(buffer: usize) -> (ChannelTransport, ChannelTransport) {
    let (tx_a, rx_b) = mpsc::channel(buffer);
    let (tx_b, rx_a) = mpsc::channel(buffer);
    (
        ChannelTransport { tx: tx_a, rx: rx_a },
        ChannelTransport { tx: tx_b, rx: rx_b },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn messages_round_trip_through_channel_pair() {
        let (mut parent, mut coordinator) = channel_pair(8);
        parent.send(HaMessage::Register).await.unwrap();
        let received = coordinator.recv_timeout(Duration::from_millis(100)).await.unwrap();
        assert!(matches!(received, Some(HaMessage::Register)));
    }

    #[tokio::test]
    async fn recv_timeout_returns_none_without_panicking() {
        let (_parent, mut coordinator) = channel_pair(8);
        let received = coordinator.recv_timeout(Duration::from_millis(10)).await.unwrap();
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn disconnect_surfaces_as_error() {
        let (parent, mut coordinator) = channel_pair(8);
        drop(parent);
        let received = coordinator.recv_timeout(Duration::from_millis(10)).await;
        assert!(matches!(received, Err(IpcError::Disconnected)));
    }
}
