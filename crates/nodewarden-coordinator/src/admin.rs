//! Admin operations (spec §4.6): list nodes, remove a node, set the
//! failover delay. Serviced synchronously within the coordinator's own
//! loop, never from a separate task.

use nodewarden_ports::{AuditAction, AuditEntry, AuditField, DbError, Transaction};
use nodewarden_types::{NodeListEntry, NodeStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("index {0} is out of range")]
    IndexOutOfRange(usize),
    #[error("node is currently {0} and cannot be removed")]
    NodeHoldsClaim(NodeStatus),
}

/// Reads all rows and the database clock, producing the listing shape
/// the original exposes as JSON (`ha_db_get_nodes_json`).
pub fn list_nodes(tx: &mut dyn Transaction) -> Result<Vec<NodeListEntry>, DbError> {
    let nodes = tx.select_nodes(false)?;
    let db_time = tx.db_time()?;

    Ok(nodes
        .into_iter()
        .map(|n| NodeListEntry {
            id: n.node_id.to_string(),
            name: n.name,
            status: n.status,
            lastaccess: n.lastaccess,
            address: format!("{}:{}", n.address, n.port),
            db_timestamp: db_time,
            lastaccess_age: db_time - n.lastaccess,
        })
        .collect())
}

/// Removes the node at `index` (1-based, id order). Refuses if out of
/// range or if the target currently holds an ACTIVE/STANDBY claim.
pub fn remove_node(tx: &mut dyn Transaction, index: usize) -> Result<(), AdminError> {
    let nodes = tx.select_nodes(true)?;

    let target = index
        .checked_sub(1)
        .and_then(|i| nodes.get(i))
        .ok_or(AdminError::IndexOutOfRange(index))?;

    if target.status.holds_claim() {
        return Err(AdminError::NodeHoldsClaim(target.status));
    }

    tx.delete_node(target.node_id)?;
    Ok(())
}

/// Writes the new failover delay to the configuration row and returns
/// the audit entry for the change; takes effect on the coordinator's
/// next check step.
pub fn set_failover_delay(
    tx: &mut dyn Transaction,
    previous_secs: i64,
    new_secs: i64,
) -> Result<AuditEntry, DbError> {
    tx.update_failover_delay(new_secs)?;
    Ok(AuditEntry {
        node_id: None,
        action: AuditAction::Update,
        fields: vec![AuditField {
            name: "failover_delay",
            old_value: Some(previous_secs.to_string()),
            new_value: Some(new_secs.to_string()),
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodewarden_ports::{Database, InMemoryDatabase};

    #[test]
    fn list_nodes_reports_lastaccess_age() {
        let db = InMemoryDatabase::new(60);
        let mut tx = db.begin().unwrap();
        tx.insert_node("a", NodeStatus::Standby, 10).unwrap();
        tx.commit().unwrap();
        db.set_time(25);

        let mut tx = db.begin().unwrap();
        let listing = list_nodes(tx.as_mut()).unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].lastaccess_age, 15);
    }

    #[test]
    fn remove_node_refuses_active() {
        let db = InMemoryDatabase::new(60);
        let mut tx = db.begin().unwrap();
        tx.insert_node("a", NodeStatus::Active, 0).unwrap();
        tx.commit().unwrap();

        let mut tx = db.begin().unwrap();
        let result = remove_node(tx.as_mut(), 1);
        assert!(matches!(result, Err(AdminError::NodeHoldsClaim(NodeStatus::Active))));
    }

    #[test]
    fn remove_node_out_of_range() {
        let db = InMemoryDatabase::new(60);
        let mut tx = db.begin().unwrap();
        let result = remove_node(tx.as_mut(), 1);
        assert!(matches!(result, Err(AdminError::IndexOutOfRange(1))));
    }

    #[test]
    fn remove_node_deletes_stopped_node() {
        let db = InMemoryDatabase::new(60);
        let mut tx = db.begin().unwrap();
        let id = tx.insert_node("a", NodeStatus::Stopped, 0).unwrap();
        tx.commit().unwrap();

        let mut tx = db.begin().unwrap();
        remove_node(tx.as_mut(), 1).unwrap();
        tx.commit().unwrap();

        assert!(db.node(id).is_none());
    }
}
