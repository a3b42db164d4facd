//! The SQL execution layer contract (spec §1: out of scope, referenced
//! only by the interface it exposes).
//!
//! [`Database::begin`] and the [`Transaction`] it returns model the
//! tri-state outcome of the original system's driver: a call either
//! succeeds, finds the connection [`DbError::Down`] (transient — retry
//! next tick), or hits a [`DbError::Fail`] (terminal — escalate to
//! `ERROR`). Calls block for their duration rather than being `async`;
//! spec §5 notes this is acceptable because the tick period dominates
//! query latency.

use std::collections::HashMap;
use std::sync::Arc;

use nodewarden_types::{NodeId, NodeRecord, NodeStatus, SessionId};
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use thiserror::Error;

/// Tri-state database error. `Down` is transient, `Fail` is terminal.
#[derive(Debug, Clone, Error)]
pub enum DbError {
    #[error("database connection is down")]
    Down,
    #[error("database error: {0}")]
    Fail(String),
}

/// The `config` table's HA-relevant columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigRow {
    pub failover_delay_secs: i64,
    pub auditlog_enabled: bool,
}

/// A partial update to a node row; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct NodeUpdate {
    pub node_id: Option<NodeId>,
    pub lastaccess: Option<i64>,
    pub status: Option<NodeStatus>,
    pub address: Option<String>,
    pub port: Option<u16>,
    pub session_id: Option<SessionId>,
}

impl NodeUpdate {
    #[must_use]
    pub fn for_node(node_id: NodeId) -> Self {
        Self {
            node_id: Some(node_id),
            ..Default::default()
        }
    }
}

/// A connection capable of starting transactions.
pub trait Database: Send + Sync {
    /// Starts a new transaction. Reconnects first if the connection was
    /// previously `Down`, matching `ha_db_begin`'s "connect once, then
    /// begin" sequencing.
    fn begin(&self) -> Result<Box<dyn Transaction>, DbError>;
}

/// A single database transaction: begin is implicit in [`Database::begin`];
/// callers must end it with [`Transaction::commit`] or
/// [`Transaction::rollback`].
pub trait Transaction: Send {
    /// Reads all node rows ordered by `node_id`. `lock` requests
    /// row-level locks (`SELECT ... FOR UPDATE`), matching
    /// `ha_db_get_nodes`'s `lock` parameter.
    fn select_nodes(&mut self, lock: bool) -> Result<Vec<NodeRecord>, DbError>;

    /// Reads the HA-relevant configuration row.
    fn select_config(&mut self) -> Result<ConfigRow, DbError>;

    /// Reads the current database-clock timestamp.
    fn db_time(&mut self) -> Result<i64, DbError>;

    /// Takes row-level locks on the node table without reading it back
    /// (`ha_db_lock_nodes`); used by the paused-phase lastaccess renewal.
    fn lock_nodes(&mut self) -> Result<(), DbError>;

    /// Inserts a new node row in `Stopped` status.
    fn insert_node(&mut self, name: &str, status: NodeStatus, lastaccess: i64) -> Result<NodeId, DbError>;

    /// Applies a partial update to one node row.
    fn update_node(&mut self, update: NodeUpdate) -> Result<(), DbError>;

    /// Marks a set of nodes `Unavailable` in one statement
    /// (`ha_check_standby_nodes`'s IN-list update).
    fn mark_unavailable(&mut self, node_ids: &[NodeId]) -> Result<(), DbError>;

    /// Deletes a node row.
    fn delete_node(&mut self, node_id: NodeId) -> Result<(), DbError>;

    /// Updates the failover delay configuration column.
    fn update_failover_delay(&mut self, delay_secs: i64) -> Result<(), DbError>;

    /// Commits the transaction. A `Down` result means the commit itself
    /// failed transiently (the original closes the connection so the
    /// next tick reconnects); a `Fail` result is terminal.
    fn commit(self: Box<Self>) -> Result<(), DbError>;

    /// Rolls back the transaction, discarding all pending writes.
    fn rollback(self: Box<Self>) -> Result<(), DbError>;
}

/// Deterministic in-memory [`Database`] used by tests and examples.
///
/// Simulates row-level locking with a single whole-table lock taken when
/// a transaction first requests `lock: true`; this is coarser than real
/// per-row locks but preserves the property the original relies on (no
/// two transactions can interleave once one holds the lock).
///
/// Cheaply `Clone`able (the shared state lives behind an `Arc`), so
/// several simulated coordinators can each hold their own handle to the
/// same backing table.
#[derive(Clone)]
pub struct InMemoryDatabase {
    shared: Arc<Mutex<InMemoryState>>,
}

struct InMemoryState {
    nodes: HashMap<NodeId, NodeRecord>,
    config: ConfigRow,
    db_time: i64,
    down: bool,
    fail: bool,
}

impl InMemoryDatabase {
    #[must_use]
    pub fn new(failover_delay_secs: i64) -> Self {
        Self {
            shared: Arc::new(Mutex::new(InMemoryState {
                nodes: HashMap::new(),
                config: ConfigRow {
                    failover_delay_secs,
                    auditlog_enabled: true,
                },
                db_time: 0,
                down: false,
                fail: false,
            })),
        }
    }

    /// Advances the simulated database clock (tests drive time
    /// explicitly rather than relying on wall-clock `SystemTime`).
    pub fn advance_time(&self, by_secs: i64) {
        self.shared.lock().db_time += by_secs;
    }

    pub fn set_time(&self, to: i64) {
        self.shared.lock().db_time = to;
    }

    pub fn db_time(&self) -> i64 {
        self.shared.lock().db_time
    }

    /// Simulates a connection outage: every subsequent `begin` fails with
    /// `Down` until [`InMemoryDatabase::restore`] is called.
    pub fn simulate_down(&self) {
        self.shared.lock().down = true;
    }

    pub fn restore(&self) {
        self.shared.lock().down = false;
    }

    /// Simulates a terminal database error.
    pub fn simulate_fail(&self) {
        self.shared.lock().fail = true;
    }

    pub fn set_failover_delay(&self, secs: i64) {
        self.shared.lock().config.failover_delay_secs = secs;
    }

    pub fn node(&self, node_id: NodeId) -> Option<NodeRecord> {
        self.shared.lock().nodes.get(&node_id).cloned()
    }

    pub fn nodes(&self) -> Vec<NodeRecord> {
        let mut nodes: Vec<_> = self.shared.lock().nodes.values().cloned().collect();
        nodes.sort_by_key(|n| n.node_id);
        nodes
    }
}

impl Database for InMemoryDatabase {
    fn begin(&self) -> Result<Box<dyn Transaction>, DbError> {
        {
            let state = self.shared.lock();
            if state.fail {
                return Err(DbError::Fail("simulated terminal database error".into()));
            }
            if state.down {
                return Err(DbError::Down);
            }
        }
        Ok(Box::new(InMemoryTransaction {
            shared: self.shared.clone(),
            guard: None,
            pending_inserts: Vec::new(),
            pending_updates: Vec::new(),
            pending_deletes: Vec::new(),
            pending_unavailable: Vec::new(),
            pending_failover_delay: None,
        }))
    }
}

struct PendingInsert {
    node_id: NodeId,
    name: String,
    status: NodeStatus,
    lastaccess: i64,
}

struct InMemoryTransaction {
    shared: Arc<Mutex<InMemoryState>>,
    guard: Option<ArcMutexGuard<RawMutex, InMemoryState>>,
    pending_inserts: Vec<PendingInsert>,
    pending_updates: Vec<NodeUpdate>,
    pending_deletes: Vec<NodeId>,
    pending_unavailable: Vec<NodeId>,
    pending_failover_delay: Option<i64>,
}

impl InMemoryTransaction {
    /// Reads one field of the shared state, using the held lock if this
    /// transaction already has one, or a brief unlocked acquisition
    /// otherwise. parking_lot's mutex is not reentrant, so a transaction
    /// that already holds `guard` must read through it rather than
    /// lock again.
    fn read<T>(&mut self, f: impl FnOnce(&InMemoryState) -> T) -> T {
        if let Some(guard) = &self.guard {
            f(guard)
        } else {
            f(&self.shared.lock())
        }
    }

    fn ensure_locked(&mut self) {
        if self.guard.is_none() {
            self.guard = Some(Mutex::lock_arc(&self.shared));
        }
    }
}

impl Transaction for InMemoryTransaction {
    fn select_nodes(&mut self, lock: bool) -> Result<Vec<NodeRecord>, DbError> {
        if lock {
            self.ensure_locked();
        }
        Ok(self.read(|state| {
            let mut nodes: Vec<_> = state.nodes.values().cloned().collect();
            nodes.sort_by_key(|n| n.node_id);
            nodes
        }))
    }

    fn select_config(&mut self) -> Result<ConfigRow, DbError> {
        Ok(self.read(|state| state.config))
    }

    fn db_time(&mut self) -> Result<i64, DbError> {
        Ok(self.read(|state| state.db_time))
    }

    fn lock_nodes(&mut self) -> Result<(), DbError> {
        self.ensure_locked();
        Ok(())
    }

    fn insert_node(&mut self, name: &str, status: NodeStatus, lastaccess: i64) -> Result<NodeId, DbError> {
        let node_id = NodeId::generate();
        self.pending_inserts.push(PendingInsert {
            node_id,
            name: name.to_string(),
            status,
            lastaccess,
        });
        Ok(node_id)
    }

    fn update_node(&mut self, update: NodeUpdate) -> Result<(), DbError> {
        self.pending_updates.push(update);
        Ok(())
    }

    fn mark_unavailable(&mut self, node_ids: &[NodeId]) -> Result<(), DbError> {
        self.pending_unavailable.extend_from_slice(node_ids);
        Ok(())
    }

    fn delete_node(&mut self, node_id: NodeId) -> Result<(), DbError> {
        self.pending_deletes.push(node_id);
        Ok(())
    }

    fn update_failover_delay(&mut self, delay_secs: i64) -> Result<(), DbError> {
        self.pending_failover_delay = Some(delay_secs);
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> Result<(), DbError> {
        self.ensure_locked();
        let state = self.guard.as_mut().unwrap();

        if state.fail {
            return Err(DbError::Fail("simulated terminal database error".into()));
        }
        if state.down {
            return Err(DbError::Down);
        }

        for insert in self.pending_inserts.drain(..) {
            state.nodes.insert(
                insert.node_id,
                NodeRecord {
                    node_id: insert.node_id,
                    name: insert.name,
                    status: insert.status,
                    lastaccess: insert.lastaccess,
                    address: String::new(),
                    port: 0,
                    session_id: SessionId::generate(),
                },
            );
        }

        for update in self.pending_updates.drain(..) {
            let Some(node_id) = update.node_id else { continue };
            if let Some(node) = state.nodes.get_mut(&node_id) {
                if let Some(la) = update.lastaccess {
                    node.lastaccess = la;
                }
                if let Some(status) = update.status {
                    node.status = status;
                }
                if let Some(address) = update.address {
                    node.address = address;
                }
                if let Some(port) = update.port {
                    node.port = port;
                }
                if let Some(session_id) = update.session_id {
                    node.session_id = session_id;
                }
            }
        }

        for node_id in self.pending_unavailable.drain(..) {
            if let Some(node) = state.nodes.get_mut(&node_id) {
                node.status = NodeStatus::Unavailable;
            }
        }

        for node_id in self.pending_deletes.drain(..) {
            state.nodes.remove(&node_id);
        }

        if let Some(delay) = self.pending_failover_delay.take() {
            state.config.failover_delay_secs = delay;
        }

        Ok(())
    }

    fn rollback(self: Box<Self>) -> Result<(), DbError> {
        // Dropping `self` discards the pending buffers and releases the
        // lock guard (if any was taken).
        Ok(())
    }
}
