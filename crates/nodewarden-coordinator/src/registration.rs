//! Two-phase registration (spec §4.3): create-if-missing, then announce
//! under row locks once the rest of the table is visible.

use nodewarden_ports::{AuditAction, AuditEntry, AuditField, NodeUpdate, Transaction};
use nodewarden_types::{NodeId, NodeRecord, NodeStatus};

use crate::election::{CheckError, PolicyViolation};
use crate::state::CoordinatorState;

fn is_healthy(node: &NodeRecord, failover_delay_secs: i64, db_time: i64) -> bool {
    node.is_healthy(failover_delay_secs, db_time)
}

/// Validates the start mode against the currently visible rows
/// (excluding `self_id`, which does not exist yet during phase A and is
/// itself during phase B).
fn validate_mode(
    nodes: &[NodeRecord],
    self_id: Option<NodeId>,
    name: &str,
    failover_delay_secs: i64,
    db_time: i64,
) -> Result<(), PolicyViolation> {
    let others = nodes.iter().filter(|n| Some(n.node_id) != self_id);

    if name.is_empty() {
        if let Some(named) = others
            .clone()
            .find(|n| !n.is_standalone() && is_healthy(n, failover_delay_secs, db_time))
        {
            return Err(PolicyViolation(format!(
                "cannot change mode to standalone while HA node \"{}\" is active",
                named.name
            )));
        }
    } else {
        if others
            .clone()
            .any(|n| n.is_standalone() && is_healthy(n, failover_delay_secs, db_time))
        {
            return Err(PolicyViolation(
                "cannot register cluster node while a standalone node is active".into(),
            ));
        }
        if others
            .clone()
            .any(|n| n.name == name && is_healthy(n, failover_delay_secs, db_time))
        {
            return Err(PolicyViolation(format!("duplicate node name \"{name}\"")));
        }
    }
    Ok(())
}

fn no_peer_contends(nodes: &[NodeRecord], self_id: NodeId, failover_delay_secs: i64, db_time: i64) -> bool {
    !nodes
        .iter()
        .filter(|n| n.node_id != self_id)
        .any(|n| n.status.holds_claim() && is_healthy(n, failover_delay_secs, db_time))
}

/// Phase A: create the row if it does not already exist. Returns the
/// adopted or newly created `node_id`.
pub fn create_node_if_missing(tx: &mut dyn Transaction, state: &CoordinatorState) -> Result<NodeId, CheckError> {
    let nodes = tx.select_nodes(false)?;

    if let Some(existing) = nodes.iter().find(|n| n.name == state.name) {
        return Ok(existing.node_id);
    }

    let db_time = tx.db_time()?;
    let config = tx.select_config()?;
    validate_mode(&nodes, None, &state.name, config.failover_delay_secs, db_time).map_err(CheckError::Policy)?;

    let node_id = tx.insert_node(&state.name, NodeStatus::Stopped, db_time)?;
    Ok(node_id)
}

pub struct AnnounceOutcome {
    pub status: NodeStatus,
    pub audit_entries: Vec<AuditEntry>,
}

/// Phase B: re-validate under row locks and announce this node's
/// effective status.
pub fn announce(
    tx: &mut dyn Transaction,
    state: &CoordinatorState,
    node_id: NodeId,
) -> Result<AnnounceOutcome, CheckError> {
    let nodes = tx.select_nodes(true)?;
    let db_time = tx.db_time()?;
    let config = tx.select_config()?;
    let failover_delay_secs = config.failover_delay_secs;

    validate_mode(&nodes, Some(node_id), &state.name, failover_delay_secs, db_time).map_err(CheckError::Policy)?;

    let status = if state.is_standalone() {
        NodeStatus::Active
    } else if no_peer_contends(&nodes, node_id, failover_delay_secs, db_time) {
        NodeStatus::Active
    } else {
        NodeStatus::Standby
    };

    let current = nodes.iter().find(|n| n.node_id == node_id);
    let mut audit_entries = Vec::new();
    let mut update = NodeUpdate::for_node(node_id);
    update.lastaccess = Some(db_time);
    update.session_id = Some(state.session_id);

    let status_changed = current.map(|n| n.status != status).unwrap_or(true);
    if status_changed {
        update.status = Some(status);
        if config.auditlog_enabled {
            audit_entries.push(AuditEntry {
                node_id: Some(node_id),
                action: AuditAction::Update,
                fields: vec![AuditField {
                    name: "status",
                    old_value: current.map(|n| n.status.as_str().to_string()),
                    new_value: Some(status.as_str().to_string()),
                }],
            });
        }
    }

    tx.update_node(update)?;

    Ok(AnnounceOutcome { status, audit_entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodewarden_ports::{Database, InMemoryDatabase};
    use nodewarden_types::SessionId;
    use std::time::Duration;

    #[test]
    fn solo_registration_activates() {
        let db = InMemoryDatabase::new(60);
        let state = CoordinatorState::new("a".into(), SessionId::generate(), Duration::from_secs(60));

        let mut tx = db.begin().unwrap();
        let node_id = create_node_if_missing(tx.as_mut(), &state).unwrap();
        tx.commit().unwrap();

        let mut tx = db.begin().unwrap();
        let outcome = announce(tx.as_mut(), &state, node_id).unwrap();
        tx.commit().unwrap();

        assert_eq!(outcome.status, NodeStatus::Active);
    }

    #[test]
    fn second_node_becomes_standby() {
        let db = InMemoryDatabase::new(60);

        let state_a = CoordinatorState::new("a".into(), SessionId::generate(), Duration::from_secs(60));
        let mut tx = db.begin().unwrap();
        let id_a = create_node_if_missing(tx.as_mut(), &state_a).unwrap();
        tx.commit().unwrap();
        let mut tx = db.begin().unwrap();
        announce(tx.as_mut(), &state_a, id_a).unwrap();
        tx.commit().unwrap();

        let state_b = CoordinatorState::new("b".into(), SessionId::generate(), Duration::from_secs(60));
        let mut tx = db.begin().unwrap();
        let id_b = create_node_if_missing(tx.as_mut(), &state_b).unwrap();
        tx.commit().unwrap();
        let mut tx = db.begin().unwrap();
        let outcome = announce(tx.as_mut(), &state_b, id_b).unwrap();
        tx.commit().unwrap();

        assert_eq!(outcome.status, NodeStatus::Standby);
    }

    #[test]
    fn standalone_rejected_while_cluster_node_active() {
        let db = InMemoryDatabase::new(60);
        let state_a = CoordinatorState::new("a".into(), SessionId::generate(), Duration::from_secs(60));
        let mut tx = db.begin().unwrap();
        let id_a = create_node_if_missing(tx.as_mut(), &state_a).unwrap();
        tx.commit().unwrap();
        let mut tx = db.begin().unwrap();
        announce(tx.as_mut(), &state_a, id_a).unwrap();
        tx.commit().unwrap();

        let standalone = CoordinatorState::new(String::new(), SessionId::generate(), Duration::from_secs(60));
        let mut tx = db.begin().unwrap();
        let result = create_node_if_missing(tx.as_mut(), &standalone);
        assert!(matches!(result, Err(CheckError::Policy(_))));
    }
}
