//! In-process demo cluster: runs several named coordinators against a
//! shared [`InMemoryDatabase`] and prints the node listing as it changes,
//! optionally killing one node partway through to show failover.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use comfy_table::{Cell, Table};
use nodewarden_coordinator::AtomicLevelController;
use nodewarden_ports::{InMemoryAuditSink, InMemoryDatabase};
use nodewarden_types::{HaStatus, NodeListEntry, SessionId};
use tracing::info;

/// Arguments for the `demo` subcommand.
pub struct DemoArgs {
    pub nodes: usize,
    pub duration_secs: u64,
    pub failover_delay_secs: i64,
    pub kill_node: usize,
    pub kill_after_secs: u64,
}

pub async fn run(args: DemoArgs) -> Result<()> {
    if args.nodes == 0 {
        bail!("--nodes must be at least 1");
    }
    if args.kill_node > args.nodes {
        bail!("--kill-node {} is out of range for {} nodes", args.kill_node, args.nodes);
    }

    let db = InMemoryDatabase::new(args.failover_delay_secs);
    let failover_delay = Duration::from_secs(args.failover_delay_secs.max(0) as u64);

    let mut handles = Vec::with_capacity(args.nodes);
    for i in 1..=args.nodes {
        let name = format!("node-{i}");
        info!(node = %name, "starting coordinator");
        let handle = nodewarden_client::spawn_in_process(
            name,
            SessionId::generate(),
            failover_delay,
            HaStatus::Unknown,
            Box::new(db.clone()),
            Box::new(InMemoryAuditSink::new()),
            Box::new(AtomicLevelController::new("info")),
        )
        .await
        .context("failed to start coordinator")?;
        handles.push(handle);
    }

    let tick = Duration::from_secs(1);
    let mut elapsed = Duration::ZERO;
    let mut killed_index: Option<usize> = None;

    while elapsed < Duration::from_secs(args.duration_secs) {
        tokio::time::sleep(tick).await;
        elapsed += tick;
        // The coordinators' own tick loop runs on real wall-clock time
        // (see `Coordinator::running_loop`), but `InMemoryDatabase`'s
        // clock is a test double that never moves on its own — a real
        // backing database's clock advances with wall time for free.
        // Advance it here in lockstep so lastaccess/db_time arithmetic
        // actually reflects the elapsed demo time, otherwise a killed
        // node's row would never be seen as stale.
        db.advance_time(1);

        for handle in &mut handles {
            let _ = handle.recv_status(Duration::ZERO).await;
        }

        if killed_index.is_none() && args.kill_node != 0 && elapsed >= Duration::from_secs(args.kill_after_secs) {
            info!(node = args.kill_node, "killing node");
            handles[args.kill_node - 1].kill()?;
            killed_index = Some(args.kill_node - 1);
        }

        let poll_index = (0..handles.len()).find(|i| Some(*i) != killed_index);
        if let Some(i) = poll_index {
            if let Ok(body) = handles[i].get_nodes().await {
                print_listing(&body)?;
            }
        }
    }

    Ok(())
}

fn print_listing(body: &str) -> Result<()> {
    let entries: Vec<NodeListEntry> = serde_json::from_str(body).context("malformed node listing")?;

    let mut table = Table::new();
    table.set_header(vec!["Name", "Status", "Address", "Last access", "Age (s)"]);
    for entry in &entries {
        table.add_row(vec![
            Cell::new(&entry.name),
            Cell::new(format!("{:?}", entry.status)),
            Cell::new(&entry.address),
            Cell::new(entry.lastaccess),
            Cell::new(entry.lastaccess_age),
        ]);
    }
    println!("{table}");
    Ok(())
}
