//! The check step (spec §4.2) — the heart of election. Pure functions
//! over a transaction and the coordinator's in-memory state, so the
//! surrounding commit/rollback and audit-flush machinery in
//! `coordinator.rs` stays uniform across registration and the check
//! step alike.

use std::time::Duration;

use nodewarden_ports::{AuditAction, AuditEntry, AuditField, DbError, NodeUpdate, Transaction};
use nodewarden_types::{HaStatus, NodeId, NodeStatus};

use crate::state::CoordinatorState;

/// A condition discovered mid-transaction that is not a database error
/// but still forces the coordinator into `HaStatus::Error`.
#[derive(Debug, Clone)]
pub struct PolicyViolation(pub String);

#[derive(Debug)]
pub enum CheckError {
    Db(DbError),
    Policy(PolicyViolation),
}

impl From<DbError> for CheckError {
    fn from(e: DbError) -> Self {
        CheckError::Db(e)
    }
}

pub struct CheckStepOutcome {
    pub status_changed: bool,
    pub audit_entries: Vec<AuditEntry>,
}

/// Runs one check step against an already-open, row-locked transaction.
/// Returns whether `state.ha_status` changed and any audit entries to
/// flush once the caller commits.
pub fn check_step(tx: &mut dyn Transaction, state: &mut CoordinatorState) -> Result<CheckStepOutcome, CheckError> {
    let nodes = tx.select_nodes(true)?;
    let config = tx.select_config()?;
    let db_time = tx.db_time()?;

    let self_row = nodes
        .iter()
        .find(|n| n.name == state.name)
        .ok_or_else(|| CheckError::Policy(PolicyViolation("cannot find server node in registry".into())))?;

    if self_row.session_id != state.session_id {
        return Err(CheckError::Policy(PolicyViolation(
            "registry record has changed ownership".into(),
        )));
    }

    if state.node_id.is_none() {
        state.node_id = Some(self_row.node_id);
    }
    let self_id = self_row.node_id;

    state.failover_delay = Duration::from_secs(config.failover_delay_secs.max(0) as u64);
    state.auditlog_enabled = config.auditlog_enabled;
    let failover_delay_secs = state.failover_delay_secs();

    let mut new_status = state.ha_status.to_node_status().unwrap_or(NodeStatus::Stopped);
    let mut demote_peer: Option<NodeId> = None;

    if !state.is_standalone() {
        if state.ha_status == HaStatus::Active {
            let stale: Vec<NodeId> = nodes
                .iter()
                .filter(|n| {
                    n.node_id != self_id
                        && n.status == NodeStatus::Standby
                        && n.lastaccess + failover_delay_secs <= db_time
                })
                .map(|n| n.node_id)
                .collect();
            if !stale.is_empty() {
                tx.mark_unavailable(&stale)?;
            }
        } else {
            match nodes.iter().find(|n| n.status == NodeStatus::Active) {
                None => new_status = NodeStatus::Active,
                Some(leader) if leader.node_id == self_id => new_status = NodeStatus::Active,
                Some(leader) if leader.is_standalone() => {
                    return Err(CheckError::Policy(PolicyViolation(format!(
                        "cannot run in cluster mode while standalone node \"{}\" is active",
                        leader.node_id
                    ))));
                }
                Some(leader) => {
                    if leader.lastaccess != state.lastaccess_active {
                        state.lastaccess_active = leader.lastaccess;
                        state.offline_ticks_active = 0;
                    } else {
                        state.offline_ticks_active += 1;
                    }
                    let bound = failover_delay_secs / 5 + 1;
                    if i64::from(state.offline_ticks_active) > bound {
                        demote_peer = Some(leader.node_id);
                        new_status = NodeStatus::Active;
                    }
                }
            }
        }
    }

    if let Some(peer) = demote_peer {
        tx.mark_unavailable(&[peer])?;
    }

    let new_ha_status = HaStatus::from_node_status(new_status);
    let status_changed = new_ha_status != state.ha_status;

    let mut update = NodeUpdate::for_node(self_id);
    update.lastaccess = Some(db_time);
    if status_changed {
        update.status = Some(new_status);
    }
    tx.update_node(update)?;

    let mut audit_entries = Vec::new();
    if status_changed && state.auditlog_enabled {
        audit_entries.push(AuditEntry {
            node_id: Some(self_id),
            action: AuditAction::Update,
            fields: vec![AuditField {
                name: "status",
                old_value: Some(state.ha_status.as_str().to_string()),
                new_value: Some(new_ha_status.as_str().to_string()),
            }],
        });
    }

    if status_changed {
        state.ha_status = new_ha_status;
    }

    Ok(CheckStepOutcome {
        status_changed,
        audit_entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodewarden_ports::{Database, InMemoryDatabase};
    use nodewarden_types::SessionId;

    fn register_row(db: &InMemoryDatabase, name: &str, status: NodeStatus, lastaccess: i64) -> (NodeId, SessionId) {
        let mut tx = db.begin().unwrap();
        let id = tx.insert_node(name, status, lastaccess).unwrap();
        tx.commit().unwrap();
        let session = SessionId::generate();
        let mut tx = db.begin().unwrap();
        tx.update_node(NodeUpdate {
            node_id: Some(id),
            session_id: Some(session),
            ..Default::default()
        })
        .unwrap();
        tx.commit().unwrap();
        (id, session)
    }

    #[test]
    fn sole_node_promotes_itself() {
        let db = InMemoryDatabase::new(60);
        let (_id, session) = register_row(&db, "a", NodeStatus::Standby, 0);
        let mut state = CoordinatorState::new("a".into(), session, Duration::from_secs(60));
        state.ha_status = HaStatus::Standby;

        let mut tx = db.begin().unwrap();
        let outcome = check_step(tx.as_mut(), &mut state).unwrap();
        tx.commit().unwrap();

        assert!(outcome.status_changed);
        assert_eq!(state.ha_status, HaStatus::Active);
    }

    #[test]
    fn standby_does_not_promote_while_leader_is_fresh() {
        let db = InMemoryDatabase::new(60);
        register_row(&db, "a", NodeStatus::Active, 100);
        let (_id, session) = register_row(&db, "b", NodeStatus::Standby, 100);
        db.set_time(100);

        let mut state = CoordinatorState::new("b".into(), session, Duration::from_secs(60));
        state.ha_status = HaStatus::Standby;

        let mut tx = db.begin().unwrap();
        let outcome = check_step(tx.as_mut(), &mut state).unwrap();
        tx.commit().unwrap();

        assert!(!outcome.status_changed);
        assert_eq!(state.ha_status, HaStatus::Standby);
    }

    #[test]
    fn foreign_session_id_is_a_policy_violation() {
        let db = InMemoryDatabase::new(60);
        register_row(&db, "a", NodeStatus::Standby, 0);

        let mut state = CoordinatorState::new("a".into(), SessionId::generate(), Duration::from_secs(60));
        state.ha_status = HaStatus::Standby;

        let mut tx = db.begin().unwrap();
        let result = check_step(tx.as_mut(), &mut state);
        assert!(matches!(result, Err(CheckError::Policy(_))));
    }

    #[test]
    fn debounce_promotes_after_enough_stale_ticks() {
        let db = InMemoryDatabase::new(60);
        register_row(&db, "a", NodeStatus::Active, 0);
        let (_id, session) = register_row(&db, "b", NodeStatus::Standby, 0);

        let mut state = CoordinatorState::new("b".into(), session, Duration::from_secs(60));
        state.ha_status = HaStatus::Standby;

        // bound = 60/5 + 1 = 13; need offline_ticks_active > 13
        for _ in 0..14 {
            let mut tx = db.begin().unwrap();
            let outcome = check_step(tx.as_mut(), &mut state).unwrap();
            tx.commit().unwrap();
            if outcome.status_changed {
                break;
            }
        }

        assert_eq!(state.ha_status, HaStatus::Active);
    }
}
