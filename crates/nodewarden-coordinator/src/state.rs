//! Coordinator in-memory state (spec §3).

use std::time::Duration;

use nodewarden_ports::HaErrorKind;
use nodewarden_types::{DbStatus, HaStatus, NodeId, SessionId};

/// Everything a coordinator remembers between ticks. Rebuilt from
/// scratch on restart — the only state that survives a crash lives in
/// the two database rows (`ha_node`, `config`).
#[derive(Debug, Clone)]
pub struct CoordinatorState {
    pub node_id: Option<NodeId>,
    /// Empty ⇒ standalone mode.
    pub name: String,
    pub ha_status: HaStatus,
    pub db_status: DbStatus,
    pub failover_delay: Duration,
    pub auditlog_enabled: bool,
    /// Snapshot of the active peer's `lastaccess`, used by the
    /// leader-unavailable debounce.
    pub lastaccess_active: i64,
    /// Consecutive stale observations of the active peer.
    pub offline_ticks_active: u32,
    pub error: Option<String>,
    pub session_id: SessionId,
}

impl CoordinatorState {
    #[must_use]
    pub fn new(name: String, session_id: SessionId, failover_delay: Duration) -> Self {
        Self {
            node_id: None,
            name,
            ha_status: HaStatus::Unknown,
            db_status: DbStatus::Ok,
            failover_delay,
            auditlog_enabled: true,
            lastaccess_active: 0,
            offline_ticks_active: 0,
            error: None,
            session_id,
        }
    }

    #[must_use]
    pub fn is_standalone(&self) -> bool {
        self.name.is_empty()
    }

    pub fn failover_delay_secs(&self) -> i64 {
        self.failover_delay.as_secs() as i64
    }

    /// Sets the error state and records the diagnostic, unless an error
    /// was already recorded — "first error wins" (spec §7/§9).
    pub fn set_error(&mut self, _kind: HaErrorKind, detail: impl Into<String>) {
        if self.ha_status == HaStatus::Error {
            return;
        }
        self.ha_status = HaStatus::Error;
        self.error = Some(detail.into());
    }

    /// Overwrites `ha_status` unconditionally; callers must check
    /// `ha_status != Error` before calling this for any ordinary
    /// transition, since an errored coordinator must never resume
    /// making progress.
    pub fn set_status(&mut self, status: HaStatus) {
        self.ha_status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_error_wins() {
        let mut state = CoordinatorState::new("a".into(), SessionId::generate(), Duration::from_secs(60));
        state.set_error(HaErrorKind::TerminalDatabase, "first");
        state.set_error(HaErrorKind::IpcFailure, "second");
        assert_eq!(state.error.as_deref(), Some("first"));
        assert_eq!(state.ha_status, HaStatus::Error);
    }

    #[test]
    fn standalone_is_empty_name() {
        let state = CoordinatorState::new(String::new(), SessionId::generate(), Duration::from_secs(60));
        assert!(state.is_standalone());
    }
}
