//! Shared identifiers and status enums for the HA coordinator.
//!
//! - Identity ([`NodeId`], [`SessionId`])
//! - Status enums ([`NodeStatus`], `HaStatus`, [`DbStatus`])
//! - Persisted shapes ([`NodeRecord`], [`NodeListEntry`])

use std::fmt::{self, Display};

use rand::RngCore;
use serde::{Deserialize, Serialize};

mod ha_status;
pub use ha_status::HaStatus;

const ID_BYTES: usize = 16;

/// A fixed-width, collision-resistant identifier.
///
/// Generated client-side on first registration (no round-trip to the
/// database is needed to mint one) and stored as a 32-character lowercase
/// hex string, matching the width of the original system's CUID values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId([u8; ID_BYTES]);

impl NodeId {
    /// Generates a new random node id.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; ID_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Parses a node id from its hex string representation.
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != ID_BYTES * 2 {
            return None;
        }
        let mut bytes = [0u8; ID_BYTES];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hi = (chunk[0] as char).to_digit(16)?;
            let lo = (chunk[1] as char).to_digit(16)?;
            bytes[i] = ((hi << 4) | lo) as u8;
        }
        Some(Self(bytes))
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// A per-process-lifetime token written into a node's row at registration
/// to detect takeover of that row by another process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId([u8; ID_BYTES]);

impl SessionId {
    /// Generates a new random session id. Call once per process start.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; ID_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn parse(s: &str) -> Option<Self> {
        NodeId::parse(s).map(|id| Self(id.0))
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Persisted node status (the `status` column of the node table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Stopped,
    Standby,
    Unavailable,
    Active,
}

impl NodeStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            NodeStatus::Stopped => "stopped",
            NodeStatus::Standby => "standby",
            NodeStatus::Unavailable => "unavailable",
            NodeStatus::Active => "active",
        }
    }

    /// A node in this status still holds a claim on the cluster (it is
    /// not safe to remove, and in the healthy window it blocks a peer
    /// from claiming the same role).
    #[must_use]
    pub fn holds_claim(self) -> bool {
        matches!(self, NodeStatus::Active | NodeStatus::Standby)
    }

    /// The integer status code the original writes on the wire
    /// (`ha_db_get_nodes_json`'s `zbx_json_addint64(..., ZBX_PROTO_TAG_STATUS,
    /// status)`), matching spec §8 scenario 1's literal `status:3`.
    #[must_use]
    pub fn wire_code(self) -> i64 {
        match self {
            NodeStatus::Standby => 0,
            NodeStatus::Stopped => 1,
            NodeStatus::Unavailable => 2,
            NodeStatus::Active => 3,
        }
    }

    #[must_use]
    pub fn from_wire_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(NodeStatus::Standby),
            1 => Some(NodeStatus::Stopped),
            2 => Some(NodeStatus::Unavailable),
            3 => Some(NodeStatus::Active),
            _ => None,
        }
    }
}

/// Serializes a [`NodeStatus`] as its wire integer code rather than the
/// snake_case string the type's own `Serialize` impl uses elsewhere (the
/// persisted node row, internal state) — only the `get_nodes` listing
/// matches the original's integer-coded JSON shape.
mod status_wire_code {
    use super::NodeStatus;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(status: &NodeStatus, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(status.wire_code())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NodeStatus, D::Error> {
        let code = i64::deserialize(deserializer)?;
        NodeStatus::from_wire_code(code).ok_or_else(|| D::Error::custom(format!("unknown node status code {code}")))
    }
}

impl Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database connection health as observed by the tri-state driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbStatus {
    /// Connected and the last operation succeeded.
    Ok,
    /// Transient: connection lost, a reconnect may succeed next attempt.
    Down,
    /// Terminal: a non-recoverable database error.
    Fail,
}

impl DbStatus {
    #[must_use]
    pub fn is_ok(self) -> bool {
        matches!(self, DbStatus::Ok)
    }
}

/// One row of the persisted node table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub node_id: NodeId,
    pub name: String,
    pub status: NodeStatus,
    pub lastaccess: i64,
    pub address: String,
    pub port: u16,
    pub session_id: SessionId,
}

impl NodeRecord {
    /// Empty name denotes the standalone sentinel node.
    #[must_use]
    pub fn is_standalone(&self) -> bool {
        self.name.is_empty()
    }

    /// A node whose status is not `Stopped` and whose lease has not
    /// expired as of `db_time`.
    #[must_use]
    pub fn is_healthy(&self, failover_delay_secs: i64, db_time: i64) -> bool {
        self.status != NodeStatus::Stopped && self.lastaccess + failover_delay_secs > db_time
    }
}

/// One entry of an admin `list_nodes` response. `status` is serialized as
/// the original's wire integer code (spec §8 scenario 1: `status:3`),
/// not the snake_case string [`NodeStatus`] otherwise serializes as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeListEntry {
    pub id: String,
    pub name: String,
    #[serde(with = "status_wire_code")]
    pub status: NodeStatus,
    pub lastaccess: i64,
    pub address: String,
    pub db_timestamp: i64,
    pub lastaccess_age: i64,
}
