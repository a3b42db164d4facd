//! The process management contract (spec §1: out of scope, referenced
//! only by the interface it exposes).
//!
//! [`OsProcess`] is grounded directly on the supervisor's
//! start/stop/is_alive sequencing for the true separate-process
//! deployment (mirroring the original fork model); [`TaskHandle`] covers
//! the in-process deployment, where the coordinator runs as a spawned
//! task in the same binary as the parent.

use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn process: {0}")]
    Spawn(String),
    #[error("process already running")]
    AlreadyRunning,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A running coordinator, regardless of whether it lives in a child OS
/// process or a spawned task of the same binary.
pub trait ProcessHandle: Send {
    /// Requests termination. Does not block on exit; call
    /// [`ProcessHandle::try_wait`] to observe it.
    fn kill(&mut self) -> Result<(), ProcessError>;

    /// Non-blocking poll: `Some(())` once the process/task has exited.
    fn try_wait(&mut self) -> Result<Option<()>, ProcessError>;

    /// True if the process/task has not yet exited.
    fn is_alive(&mut self) -> bool {
        matches!(self.try_wait(), Ok(None))
    }
}

/// A coordinator running as an OS child process, spawned from a known
/// binary path and argument list.
pub struct OsProcess {
    child: Child,
}

impl OsProcess {
    /// Spawns `binary` with `args`, piping stdout/stderr so the parent
    /// can forward them to its own logging.
    pub fn spawn(binary: &str, args: &[String]) -> Result<Self, ProcessError> {
        let child = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ProcessError::Spawn(e.to_string()))?;
        Ok(Self { child })
    }

    /// Waits up to `grace` for the child to exit after a kill signal was
    /// sent, matching the supervisor's stop-with-timeout sequencing.
    pub async fn wait_for_exit(&mut self, grace: Duration) -> Result<(), ProcessError> {
        match timeout(grace, self.child.wait()).await {
            Ok(Ok(_status)) => Ok(()),
            Ok(Err(e)) => Err(ProcessError::Io(e)),
            Err(_) => Ok(()),
        }
    }
}

impl ProcessHandle for OsProcess {
    fn kill(&mut self) -> Result<(), ProcessError> {
        self.child.start_kill().map_err(ProcessError::Io)
    }

    fn try_wait(&mut self) -> Result<Option<()>, ProcessError> {
        match self.child.try_wait() {
            Ok(Some(_status)) => Ok(Some(())),
            Ok(None) => Ok(None),
            Err(e) => Err(ProcessError::Io(e)),
        }
    }
}

/// A coordinator running as a `tokio::task` inside the same binary as
/// the parent. Kill is an abort; there is no graceful shutdown grace
/// period because there is no separate process to wait on.
pub struct TaskHandle {
    handle: JoinHandle<()>,
}

impl TaskHandle {
    #[must_use]
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }
}

impl ProcessHandle for TaskHandle {
    fn kill(&mut self) -> Result<(), ProcessError> {
        self.handle.abort();
        Ok(())
    }

    fn try_wait(&mut self) -> Result<Option<()>, ProcessError> {
        if self.handle.is_finished() {
            Ok(Some(()))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn task_handle_reports_alive_until_finished() {
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_millis(30)).await;
        });
        let mut handle = TaskHandle::new(handle);
        assert!(handle.is_alive());
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!handle.is_alive());
    }

    #[tokio::test]
    async fn task_handle_kill_aborts_immediately() {
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        let mut handle = TaskHandle::new(handle);
        handle.kill().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_alive());
    }

    #[tokio::test]
    async fn os_process_spawn_and_kill() {
        let mut proc = OsProcess::spawn("sleep", &["5".to_string()]).unwrap();
        assert!(proc.is_alive());
        proc.kill().unwrap();
        proc.wait_for_exit(Duration::from_secs(2)).await.unwrap();
        assert!(!proc.is_alive());
    }
}
