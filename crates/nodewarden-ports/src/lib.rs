//! Interfaces for the coordinator's four external collaborators: the SQL
//! execution layer, the parent/coordinator IPC transport, the audit log
//! sink, and process management. Each is out of scope as a concrete
//! production implementation; this crate defines the trait boundary and
//! an in-memory test double for each, so [`nodewarden_coordinator`] can
//! be exercised without a real database, socket, or child process.

pub mod audit;
pub mod db;
pub mod ipc;
pub mod process;

pub use audit::{AuditEntry, AuditField, AuditSink, AuditAction, InMemoryAuditSink, NullAuditSink};
pub use db::{ConfigRow, Database, DbError, InMemoryDatabase, NodeUpdate, Transaction};
pub use ipc::{channel_pair, ChannelTransport, HaErrorKind, HaMessage, IpcError, IpcTransport};
pub use process::{OsProcess, ProcessError, ProcessHandle, TaskHandle};
