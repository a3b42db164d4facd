//! The HA coordinator: election engine, registration, tick loop, and
//! admin operations (spec §3-4).
//!
//! This crate is transport- and driver-agnostic: it is built entirely
//! against the traits in [`nodewarden_ports`], so it can be exercised with
//! the in-memory test doubles there, or wired to a real database and IPC
//! transport by a binary crate.

pub mod admin;
pub mod coordinator;
pub mod election;
pub mod error;
pub mod loglevel;
pub mod registration;
pub mod state;
mod txn;

pub use coordinator::Coordinator;
pub use error::{CoordinatorError, Result};
pub use loglevel::{AtomicLevelController, LogLevelController};
pub use state::CoordinatorState;
pub use txn::{run_transaction, StepOutcome};
