//! Convenience constructor for running the coordinator as an in-process
//! `tokio` task rather than a separate OS process (spec §9 Design Note:
//! "Process boundary"). Used by integration tests and the demo CLI.

use std::time::Duration;

use nodewarden_coordinator::{Coordinator, LogLevelController};
use nodewarden_ports::{channel_pair, AuditSink, Database};
use nodewarden_types::{HaStatus, SessionId};
use tracing::error;

use crate::error::ClientError;
use crate::handle::CoordinatorHandle;
use nodewarden_ports::TaskHandle;

/// Builds a `Coordinator`, spawns it as a `tokio` task, and returns a
/// [`CoordinatorHandle`] already registered with it.
pub async fn spawn_in_process(
    name: String,
    session_id: SessionId,
    failover_delay: Duration,
    initial_status: HaStatus,
    db: Box<dyn Database>,
    audit: Box<dyn AuditSink>,
    loglevel: Box<dyn LogLevelController>,
) -> Result<CoordinatorHandle, ClientError> {
    let (parent_transport, child_transport) = channel_pair(32);

    let mut coordinator = Coordinator::new(
        name,
        session_id,
        failover_delay,
        initial_status,
        db,
        Box::new(child_transport),
        audit,
        loglevel,
    );

    let join = tokio::spawn(async move {
        if let Err(e) = coordinator.run().await {
            error!(error = %e, "coordinator exited");
        }
    });

    CoordinatorHandle::start(Box::new(parent_transport), Box::new(TaskHandle::new(join)), failover_delay).await
}
