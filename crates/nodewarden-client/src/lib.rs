//! The parent-side client API for the nodewarden HA coordinator (spec §4.4).
//!
//! [`CoordinatorHandle`] is what the embedding service holds: it starts
//! the coordinator, supervises its heartbeat, relays status updates, and
//! issues the admin requests (list/remove nodes, change the failover
//! delay, step the log level).

mod error;
mod handle;
mod spawn;

pub use error::ClientError;
pub use handle::{CoordinatorHandle, LogLevelDirection};
pub use spawn::spawn_in_process;
