//! The coordinator loop (spec §4.1) and its IPC dispatch table. Running
//! and paused phases are two nested loops, not a single state machine
//! with a `Paused` variant threaded through every match arm — this
//! mirrors the source's `ha_manager_thread` control flow directly.

use std::time::Duration;

use nodewarden_ports::{AuditSink, Database, DbError, HaErrorKind, HaMessage, IpcTransport, Transaction};
use nodewarden_types::{DbStatus, HaStatus};
use tracing::{debug, info, warn};

use crate::admin::{self, AdminError};
use crate::election::{self, CheckError, PolicyViolation};
use crate::error::CoordinatorError;
use crate::loglevel::LogLevelController;
use crate::registration;
use crate::state::CoordinatorState;

type Result<T> = std::result::Result<T, CoordinatorError>;

const TICK_PERIOD: Duration = Duration::from_secs(1);

pub struct Coordinator {
    db: Box<dyn Database>,
    transport: Box<dyn IpcTransport>,
    audit: Box<dyn AuditSink>,
    loglevel: Box<dyn LogLevelController>,
    state: CoordinatorState,
    tick: u64,
    nextcheck: u64,
    parent_registered: bool,
}

impl Coordinator {
    pub fn new(
        name: String,
        session_id: nodewarden_types::SessionId,
        failover_delay: Duration,
        initial_status: HaStatus,
        db: Box<dyn Database>,
        transport: Box<dyn IpcTransport>,
        audit: Box<dyn AuditSink>,
        loglevel: Box<dyn LogLevelController>,
    ) -> Self {
        let mut state = CoordinatorState::new(name, session_id, failover_delay);
        state.ha_status = initial_status;
        // A just-demoted node gets a doubled first nextcheck so it does
        // not race itself back into ACTIVE (spec §4.1).
        let nextcheck = if initial_status == HaStatus::Standby { 10 } else { 5 };
        Self {
            db,
            transport,
            audit,
            loglevel,
            state,
            tick: 0,
            nextcheck,
            parent_registered: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> &CoordinatorState {
        &self.state
    }

    pub async fn run(&mut self) -> Result<()> {
        if self.state.ha_status == HaStatus::Unknown {
            self.register().await?;
        }
        match self.running_loop().await {
            Ok(()) => self.paused_loop().await,
            Err(e) => {
                self.report_fatal(&e).await;
                Err(e)
            }
        }
    }

    async fn report_fatal(&mut self, error: &CoordinatorError) {
        if self.parent_registered {
            let _ = self
                .transport
                .send(HaMessage::UpdateReply {
                    status: self.state.ha_status,
                    failover_delay_secs: self.state.failover_delay_secs(),
                    error: Some((error.kind(), error.to_string())),
                })
                .await;
        }
    }

    async fn register(&mut self) -> Result<()> {
        loop {
            let node_id = match run_check_tx(self.db.as_ref(), |tx| {
                registration::create_node_if_missing(tx, &self.state)
            })? {
                Some(id) => id,
                None => {
                    self.state.db_status = DbStatus::Down;
                    tokio::time::sleep(TICK_PERIOD).await;
                    continue;
                }
            };
            self.state.db_status = DbStatus::Ok;
            self.state.node_id = Some(node_id);

            match run_check_tx(self.db.as_ref(), |tx| registration::announce(tx, &self.state, node_id))? {
                Some(outcome) => {
                    if !outcome.audit_entries.is_empty() {
                        let _ = self.audit.emit(&outcome.audit_entries);
                    }
                    self.state.ha_status = HaStatus::from_node_status(outcome.status);
                    info!(status = %self.state.ha_status, "registered");
                    return Ok(());
                }
                None => {
                    self.state.db_status = DbStatus::Down;
                    tokio::time::sleep(TICK_PERIOD).await;
                }
            }
        }
    }

    async fn running_loop(&mut self) -> Result<()> {
        loop {
            match self.transport.recv_timeout(TICK_PERIOD).await {
                Ok(Some(message)) => {
                    if self.dispatch(message).await? {
                        return Ok(()); // entering paused phase
                    }
                }
                Ok(None) => {
                    self.advance_tick().await?;
                    if self.state.ha_status.is_terminal_error() {
                        return Err(CoordinatorError::Terminal(
                            self.state.error.clone().unwrap_or_default(),
                        ));
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// The paused phase: tick-driven checks stop, but `lastaccess` is
    /// still renewed so the row does not expire during shutdown.
    /// Returns once a STOP message is handled.
    async fn paused_loop(&mut self) -> Result<()> {
        loop {
            match self.transport.recv_timeout(TICK_PERIOD).await {
                Ok(Some(HaMessage::Stop)) => {
                    self.stop_self().await?;
                    return Ok(());
                }
                Ok(Some(message)) => {
                    self.dispatch_paused(message).await?;
                }
                Ok(None) => {
                    self.renew_lastaccess_paused().await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn stop_self(&mut self) -> Result<()> {
        if self.state.ha_status.holds_claim() {
            if let Some(node_id) = self.state.node_id {
                run_tx(self.db.as_ref(), |tx| {
                    tx.update_node(nodewarden_ports::NodeUpdate {
                        node_id: Some(node_id),
                        status: Some(nodewarden_types::NodeStatus::Stopped),
                        ..Default::default()
                    })
                })?;
            }
        }
        self.state.ha_status = HaStatus::Stopped;
        Ok(())
    }

    async fn renew_lastaccess_paused(&mut self) -> Result<()> {
        if !self.state.ha_status.holds_claim() {
            return Ok(());
        }
        let Some(node_id) = self.state.node_id else {
            return Ok(());
        };
        let outcome = run_tx(self.db.as_ref(), |tx| {
            tx.lock_nodes()?;
            let db_time = tx.db_time()?;
            tx.update_node(nodewarden_ports::NodeUpdate {
                node_id: Some(node_id),
                lastaccess: Some(db_time),
                ..Default::default()
            })
        })?;
        self.state.db_status = if outcome.is_some() { DbStatus::Ok } else { DbStatus::Down };
        Ok(())
    }

    async fn advance_tick(&mut self) -> Result<()> {
        self.tick += 1;
        if self.tick >= self.nextcheck {
            self.run_check_step().await?;
            self.nextcheck += if self.state.db_status == DbStatus::Ok { 5 } else { 1 };
        }
        if self.state.db_status.is_ok() && self.parent_registered {
            let _ = self.transport.send(HaMessage::Heartbeat).await;
        }
        Ok(())
    }

    async fn run_check_step(&mut self) -> Result<()> {
        let outcome = run_check_tx(self.db.as_ref(), |tx| election::check_step(tx, &mut self.state));
        match outcome {
            Ok(Some(step)) => {
                self.state.db_status = DbStatus::Ok;
                if !step.audit_entries.is_empty() {
                    let _ = self.audit.emit(&step.audit_entries);
                }
                if step.status_changed && self.parent_registered {
                    self.transport
                        .send(HaMessage::UpdateReply {
                            status: self.state.ha_status,
                            failover_delay_secs: self.state.failover_delay_secs(),
                            error: None,
                        })
                        .await?;
                }
                Ok(())
            }
            Ok(None) => {
                self.state.db_status = DbStatus::Down;
                Ok(())
            }
            Err(e) => {
                self.state.set_error(e.kind(), e.to_string());
                Err(e)
            }
        }
    }

    /// Dispatches one message while running. Returns `true` when the
    /// coordinator should move to the paused phase.
    async fn dispatch(&mut self, message: HaMessage) -> Result<bool> {
        match message {
            HaMessage::Register => {
                self.parent_registered = true;
                Ok(false)
            }
            HaMessage::UpdateRequest { .. } => {
                self.transport
                    .send(HaMessage::UpdateReply {
                        status: self.state.ha_status,
                        failover_delay_secs: self.state.failover_delay_secs(),
                        error: self.state.error.clone().map(|e| (HaErrorKind::PolicyViolation, e)),
                    })
                    .await?;
                Ok(false)
            }
            HaMessage::Pause => Ok(true),
            HaMessage::Stop => {
                self.stop_self().await?;
                Ok(true)
            }
            HaMessage::GetNodesRequest => {
                self.handle_get_nodes().await?;
                Ok(false)
            }
            HaMessage::RemoveNodeRequest { index } => {
                self.handle_remove_node(index).await?;
                Ok(false)
            }
            HaMessage::SetFailoverDelayRequest { delay_secs } => {
                self.handle_set_failover_delay(delay_secs).await?;
                Ok(false)
            }
            HaMessage::LogLevelIncrease => {
                self.loglevel.increase();
                debug!(level = self.loglevel.current(), "log level increased");
                Ok(false)
            }
            HaMessage::LogLevelDecrease => {
                self.loglevel.decrease();
                debug!(level = self.loglevel.current(), "log level decreased");
                Ok(false)
            }
            HaMessage::Heartbeat | HaMessage::UpdateReply { .. } | HaMessage::GetNodesReply { .. } => {
                warn!("ignoring unexpected parent-originated reply message");
                Ok(false)
            }
            HaMessage::RemoveNodeReply { .. } | HaMessage::SetFailoverDelayReply { .. } => {
                warn!("ignoring unexpected parent-originated reply message");
                Ok(false)
            }
        }
    }

    /// Only admin requests and the renewal tick are serviced while paused.
    async fn dispatch_paused(&mut self, message: HaMessage) -> Result<()> {
        match message {
            HaMessage::GetNodesRequest => self.handle_get_nodes().await,
            HaMessage::RemoveNodeRequest { index } => self.handle_remove_node(index).await,
            HaMessage::SetFailoverDelayRequest { delay_secs } => self.handle_set_failover_delay(delay_secs).await,
            _ => Ok(()),
        }
    }

    async fn handle_get_nodes(&mut self) -> Result<()> {
        let listing = run_tx(self.db.as_ref(), admin::list_nodes)?;
        let reply = match listing {
            Some(entries) => match serde_json::to_string(&entries) {
                Ok(body) => HaMessage::GetNodesReply { ok: true, body },
                Err(e) => HaMessage::GetNodesReply {
                    ok: false,
                    body: e.to_string(),
                },
            },
            None => HaMessage::GetNodesReply {
                ok: false,
                body: "database unavailable".into(),
            },
        };
        self.transport.send(reply).await?;
        Ok(())
    }

    async fn handle_remove_node(&mut self, index: usize) -> Result<()> {
        let result = run_admin_tx(self.db.as_ref(), |tx| admin::remove_node(tx, index))?;
        let reply = HaMessage::RemoveNodeReply {
            error: result.err().map(|e| (HaErrorKind::AdminRequest, e.to_string())),
        };
        self.transport.send(reply).await?;
        Ok(())
    }

    async fn handle_set_failover_delay(&mut self, delay_secs: i64) -> Result<()> {
        let previous = self.state.failover_delay_secs();
        let result = run_tx(self.db.as_ref(), |tx| admin::set_failover_delay(tx, previous, delay_secs))?;
        let reply = match result {
            Some(entry) => {
                self.state.failover_delay = Duration::from_secs(delay_secs.max(0) as u64);
                let _ = self.audit.emit(std::slice::from_ref(&entry));
                HaMessage::SetFailoverDelayReply { error: None }
            }
            None => HaMessage::SetFailoverDelayReply {
                error: Some((HaErrorKind::TransientDatabase, "database unavailable".into())),
            },
        };
        self.transport.send(reply).await?;
        Ok(())
    }
}

/// Runs a body producing `DbError` only, via the shared
/// begin/body/commit/rollback helper in `txn`. `Ok(None)` means the step
/// was abandoned on a transient DOWN (retry next tick); a terminal FAIL
/// is propagated as a fatal `CoordinatorError` rather than swallowed —
/// an admin request riding on a dying database connection must still
/// escalate the whole coordinator to `Error` (spec §4.5/§7), not just
/// report "unavailable" to the requester and carry on.
fn run_tx<T>(db: &dyn Database, body: impl FnOnce(&mut dyn Transaction) -> std::result::Result<T, DbError>) -> Result<Option<T>> {
    match crate::txn::run_transaction(db, body)? {
        crate::txn::StepOutcome::Committed(value) => Ok(Some(value)),
        crate::txn::StepOutcome::Down => Ok(None),
    }
}

/// Runs an admin-request body that can fail with a recoverable
/// [`AdminError`] (out-of-range index, node holds a claim) as well as
/// the database's tri-state outcome. A terminal FAIL still escalates to
/// a fatal `CoordinatorError`; everything else becomes the `AdminError`
/// reported back to the requester.
fn run_admin_tx<T>(
    db: &dyn Database,
    body: impl FnOnce(&mut dyn Transaction) -> std::result::Result<T, AdminError>,
) -> Result<std::result::Result<T, AdminError>> {
    let mut tx = match db.begin() {
        Ok(tx) => tx,
        Err(DbError::Down) => return Ok(Err(AdminError::Db(DbError::Down))),
        Err(e @ DbError::Fail(_)) => return Err(CoordinatorError::Database(e)),
    };

    match body(tx.as_mut()) {
        Ok(value) => match tx.commit() {
            Ok(()) => Ok(Ok(value)),
            Err(DbError::Down) => Ok(Err(AdminError::Db(DbError::Down))),
            Err(e @ DbError::Fail(_)) => Err(CoordinatorError::Database(e)),
        },
        Err(AdminError::Db(DbError::Fail(msg))) => {
            let _ = tx.rollback();
            Err(CoordinatorError::Database(DbError::Fail(msg)))
        }
        Err(e) => {
            let _ = tx.rollback();
            Ok(Err(e))
        }
    }
}

/// Runs a body that can fail with either a transient/terminal database
/// error or a policy violation; used by registration and the check
/// step. `Ok(None)` means DOWN (retry next tick); `Err` is fatal.
fn run_check_tx<T>(
    db: &dyn Database,
    body: impl FnOnce(&mut dyn Transaction) -> std::result::Result<T, CheckError>,
) -> Result<Option<T>> {
    let mut tx = match db.begin() {
        Ok(tx) => tx,
        Err(DbError::Down) => return Ok(None),
        Err(DbError::Fail(msg)) => return Err(CoordinatorError::Database(DbError::Fail(msg))),
    };

    match body(tx.as_mut()) {
        Ok(value) => match tx.commit() {
            Ok(()) => Ok(Some(value)),
            Err(DbError::Down) => Ok(None),
            Err(DbError::Fail(msg)) => Err(CoordinatorError::Database(DbError::Fail(msg))),
        },
        Err(CheckError::Db(DbError::Down)) => {
            let _ = tx.rollback();
            Ok(None)
        }
        Err(CheckError::Db(DbError::Fail(msg))) => {
            let _ = tx.rollback();
            Err(CoordinatorError::Database(DbError::Fail(msg)))
        }
        Err(CheckError::Policy(PolicyViolation(msg))) => {
            let _ = tx.rollback();
            Err(CoordinatorError::PolicyViolation(msg))
        }
    }
}
