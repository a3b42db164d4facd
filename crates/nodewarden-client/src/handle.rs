//! The parent-side client API (spec §4.4): start/stop/pause/kill a
//! coordinator, receive its status updates, and issue admin requests.
//!
//! [`CoordinatorHandle`] is parameterized only by the two port traits it
//! needs (`IpcTransport`, `ProcessHandle`) — it does not know whether the
//! coordinator on the other end is a separate OS process or an in-process
//! task; [`spawn_in_process`] is the convenience constructor used by tests
//! and the demo CLI for the latter.

use std::time::Duration;

use nodewarden_ports::{HaErrorKind, HaMessage, IpcTransport, ProcessHandle};
use nodewarden_types::HaStatus;
use tokio::time::Instant;
use tracing::warn;

use crate::error::ClientError;

/// A single increase/decrease step for the coordinator's log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevelDirection {
    Increase,
    Decrease,
}

/// The parent's view of one coordinator: the IPC channel to it, the
/// handle used to kill it, and the liveness/status bookkeeping needed to
/// detect a coordinator that is connected but no longer making progress.
pub struct CoordinatorHandle {
    transport: Box<dyn IpcTransport>,
    process: Box<dyn ProcessHandle>,
    last_heartbeat: Instant,
    status: HaStatus,
    failover_delay: Duration,
    error: Option<(HaErrorKind, String)>,
    closed: bool,
}

impl CoordinatorHandle {
    /// Wraps an already-opened transport/process pair and sends the
    /// initial `REGISTER` message, per spec §4.4's `start`. On failure to
    /// register, the child is killed immediately.
    pub async fn start(
        mut transport: Box<dyn IpcTransport>,
        mut process: Box<dyn ProcessHandle>,
        failover_delay: Duration,
    ) -> Result<Self, ClientError> {
        if let Err(e) = transport.send(HaMessage::Register).await {
            let _ = process.kill();
            return Err(e.into());
        }
        Ok(Self {
            transport,
            process,
            last_heartbeat: Instant::now(),
            status: HaStatus::Unknown,
            failover_delay,
            error: None,
            closed: false,
        })
    }

    #[must_use]
    pub fn status(&self) -> HaStatus {
        self.status
    }

    /// Drains any pending messages and returns the coordinator's current
    /// status. If the parent has not heard a heartbeat recently enough
    /// while the last known status was `ACTIVE`, the demotion to
    /// `STANDBY` is synthesized here rather than waited for — this is
    /// the parent's defense against a coordinator that is alive enough to
    /// keep the socket open but no longer talking to the database.
    pub async fn recv_status(&mut self, timeout: Duration) -> (HaStatus, Option<(HaErrorKind, String)>) {
        match self.transport.recv_timeout(timeout).await {
            Ok(Some(message)) => self.apply(message),
            Ok(None) => {}
            Err(_) => self.mark_disconnected(),
        }
        while let Ok(Some(message)) = self.transport.recv_timeout(Duration::ZERO).await {
            self.apply(message);
        }
        self.effective_status()
    }

    /// Requests a fresh status push; the reply arrives asynchronously via
    /// a subsequent [`CoordinatorHandle::recv_status`] call.
    pub async fn get_status(&mut self) -> Result<(), ClientError> {
        self.send(HaMessage::UpdateRequest {
            status: None,
            failover_delay_secs: None,
            error: None,
        })
        .await
    }

    /// Synchronous request/reply: fetches the JSON node listing.
    pub async fn get_nodes(&mut self) -> Result<String, ClientError> {
        self.send(HaMessage::GetNodesRequest).await?;
        loop {
            match self.recv_matching(Duration::from_secs(5)).await? {
                HaMessage::GetNodesReply { ok: true, body } => return Ok(body),
                HaMessage::GetNodesReply { ok: false, body } => return Err(ClientError::Remote(body)),
                _ => unreachable!("recv_matching only returns GetNodesReply here"),
            }
        }
    }

    /// Synchronous request/reply: removes the node at `index` (1-based).
    pub async fn remove_node(&mut self, index: usize) -> Result<(), ClientError> {
        self.send(HaMessage::RemoveNodeRequest { index }).await?;
        match self.recv_matching(Duration::from_secs(5)).await? {
            HaMessage::RemoveNodeReply { error: None } => Ok(()),
            HaMessage::RemoveNodeReply { error: Some((_, detail)) } => Err(ClientError::Remote(detail)),
            _ => unreachable!("recv_matching only returns RemoveNodeReply here"),
        }
    }

    /// Synchronous request/reply: changes the failover delay.
    pub async fn set_failover_delay(&mut self, delay: Duration) -> Result<(), ClientError> {
        self.send(HaMessage::SetFailoverDelayRequest {
            delay_secs: delay.as_secs() as i64,
        })
        .await?;
        match self.recv_matching(Duration::from_secs(5)).await? {
            HaMessage::SetFailoverDelayReply { error: None } => {
                self.failover_delay = delay;
                Ok(())
            }
            HaMessage::SetFailoverDelayReply { error: Some((_, detail)) } => Err(ClientError::Remote(detail)),
            _ => unreachable!("recv_matching only returns SetFailoverDelayReply here"),
        }
    }

    /// Enters the paused phase; does not wait for confirmation.
    pub async fn pause(&mut self) -> Result<(), ClientError> {
        self.send(HaMessage::Pause).await
    }

    /// Pauses then stops the coordinator, and waits for the child to exit.
    pub async fn stop(&mut self, grace: Duration) -> Result<(), ClientError> {
        self.send(HaMessage::Pause).await?;
        self.send(HaMessage::Stop).await?;
        let deadline = Instant::now() + grace;
        while self.process.is_alive() {
            if Instant::now() >= deadline {
                warn!("coordinator did not exit within the grace period, killing");
                self.process.kill()?;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.closed = true;
        Ok(())
    }

    /// Kills the child immediately and closes the channel. Used only on
    /// start-up failure or abort, per spec §4.4.
    pub fn kill(&mut self) -> Result<(), ClientError> {
        self.closed = true;
        self.process.kill().map_err(Into::into)
    }

    pub async fn change_loglevel(&mut self, direction: LogLevelDirection) -> Result<(), ClientError> {
        let message = match direction {
            LogLevelDirection::Increase => HaMessage::LogLevelIncrease,
            LogLevelDirection::Decrease => HaMessage::LogLevelDecrease,
        };
        self.send(message).await
    }

    async fn send(&mut self, message: HaMessage) -> Result<(), ClientError> {
        if self.closed {
            return Err(ClientError::Ipc(nodewarden_ports::IpcError::Disconnected));
        }
        self.transport.send(message).await.map_err(Into::into)
    }

    /// Waits for a reply of the kind the caller expects, feeding every
    /// other message (heartbeats, async status pushes) through
    /// [`CoordinatorHandle::apply`] instead of discarding it. This lets
    /// the admin request/reply calls share one transport with the async
    /// update stream without racing against it, matching spec §4.4's
    /// "fresh channel" intent for an in-process `mpsc` transport that is
    /// already exclusively owned by the parent (see DESIGN.md).
    async fn recv_matching(&mut self, timeout: Duration) -> Result<HaMessage, ClientError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ClientError::Timeout);
            }
            match self.transport.recv_timeout(remaining).await? {
                Some(HaMessage::GetNodesReply { ok, body }) => return Ok(HaMessage::GetNodesReply { ok, body }),
                Some(HaMessage::RemoveNodeReply { error }) => return Ok(HaMessage::RemoveNodeReply { error }),
                Some(HaMessage::SetFailoverDelayReply { error }) => {
                    return Ok(HaMessage::SetFailoverDelayReply { error })
                }
                Some(other) => {
                    self.apply(other);
                }
                None => return Err(ClientError::Timeout),
            }
        }
    }

    fn apply(&mut self, message: HaMessage) {
        match message {
            HaMessage::Heartbeat => self.last_heartbeat = Instant::now(),
            HaMessage::UpdateReply {
                status,
                failover_delay_secs,
                error,
            } => {
                self.status = status;
                self.failover_delay = Duration::from_secs(failover_delay_secs.max(0) as u64);
                self.error = error;
            }
            _ => {}
        }
    }

    fn mark_disconnected(&mut self) {
        self.status = HaStatus::Error;
        self.error = Some((HaErrorKind::IpcFailure, "coordinator disconnected".into()));
    }

    /// Synthesizes a demotion to `STANDBY` when the heartbeat has gone
    /// quiet for `failover_delay - 5` seconds while status is `ACTIVE`
    /// (spec §4.4/§5): the parent begins teardown one tick before the
    /// coordinator itself would be marked `UNAVAILABLE` by another node.
    fn effective_status(&self) -> (HaStatus, Option<(HaErrorKind, String)>) {
        if self.status == HaStatus::Active {
            let threshold = self.failover_delay.saturating_sub(Duration::from_secs(5));
            if self.last_heartbeat.elapsed() >= threshold {
                return (HaStatus::Standby, self.error.clone());
            }
        }
        (self.status, self.error.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodewarden_ports::{channel_pair, ProcessError, TaskHandle};

    struct NeverExits;

    impl ProcessHandle for NeverExits {
        fn kill(&mut self) -> Result<(), ProcessError> {
            Ok(())
        }
        fn try_wait(&mut self) -> Result<Option<()>, ProcessError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn start_sends_register() {
        let (parent, mut child) = channel_pair(8);
        let handle = CoordinatorHandle::start(Box::new(parent), Box::new(NeverExits), Duration::from_secs(60)).await;
        assert!(handle.is_ok());
        let received = child.recv_timeout(Duration::from_millis(50)).await.unwrap();
        assert!(matches!(received, Some(HaMessage::Register)));
    }

    #[tokio::test]
    async fn recv_status_tracks_last_update() {
        let (parent, mut child) = channel_pair(8);
        let mut handle = CoordinatorHandle::start(Box::new(parent), Box::new(NeverExits), Duration::from_secs(60))
            .await
            .unwrap();
        let _ = child.recv_timeout(Duration::from_millis(50)).await;

        child
            .send(HaMessage::UpdateReply {
                status: HaStatus::Active,
                failover_delay_secs: 60,
                error: None,
            })
            .await
            .unwrap();

        let (status, error) = handle.recv_status(Duration::from_millis(100)).await;
        assert_eq!(status, HaStatus::Active);
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn stale_heartbeat_synthesizes_demotion() {
        let (parent, mut child) = channel_pair(8);
        let mut handle = CoordinatorHandle::start(Box::new(parent), Box::new(NeverExits), Duration::from_millis(50))
            .await
            .unwrap();
        let _ = child.recv_timeout(Duration::from_millis(50)).await;

        child
            .send(HaMessage::UpdateReply {
                status: HaStatus::Active,
                failover_delay_secs: 0,
                error: None,
            })
            .await
            .unwrap();
        // failover_delay is set from the wire message (0), so the
        // synthesized threshold saturates to zero and fires immediately.
        let (status, _) = handle.recv_status(Duration::from_millis(50)).await;
        assert_eq!(status, HaStatus::Standby);
    }

    #[tokio::test]
    async fn get_nodes_round_trips_while_ignoring_heartbeats() {
        let (parent, mut child) = channel_pair(8);
        let mut handle = CoordinatorHandle::start(Box::new(parent), Box::new(NeverExits), Duration::from_secs(60))
            .await
            .unwrap();
        let _ = child.recv_timeout(Duration::from_millis(50)).await;

        let child_task = tokio::spawn(async move {
            let request = child.recv_timeout(Duration::from_millis(200)).await.unwrap();
            assert!(matches!(request, Some(HaMessage::GetNodesRequest)));
            child.send(HaMessage::Heartbeat).await.unwrap();
            child
                .send(HaMessage::GetNodesReply {
                    ok: true,
                    body: "[]".into(),
                })
                .await
                .unwrap();
        });

        let body = handle.get_nodes().await.unwrap();
        assert_eq!(body, "[]");
        child_task.await.unwrap();
    }

    #[tokio::test]
    async fn stop_waits_for_process_exit() {
        let (parent, mut child) = channel_pair(8);
        let join = tokio::spawn(async move {
            let _ = child.recv_timeout(Duration::from_millis(200)).await;
            let _ = child.recv_timeout(Duration::from_millis(200)).await;
        });
        let mut handle =
            CoordinatorHandle::start(Box::new(parent), Box::new(TaskHandle::new(join)), Duration::from_secs(60))
                .await
                .unwrap();

        handle.stop(Duration::from_secs(1)).await.unwrap();
    }
}
