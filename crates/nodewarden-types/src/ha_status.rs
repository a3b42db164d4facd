use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// The coordinator's own view of its HA status.
///
/// A superset of [`crate::NodeStatus`]: includes `Uninitialized` (before
/// the parent has told the coordinator anything) and `Unknown`/`Error`,
/// which never appear in the persisted node table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaStatus {
    Uninitialized,
    Unknown,
    Stopped,
    Standby,
    Unavailable,
    Active,
    Error,
}

impl HaStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HaStatus::Uninitialized => "uninitialized",
            HaStatus::Unknown => "unknown",
            HaStatus::Stopped => "stopped",
            HaStatus::Standby => "standby",
            HaStatus::Unavailable => "unavailable",
            HaStatus::Active => "active",
            HaStatus::Error => "error",
        }
    }

    #[must_use]
    pub fn is_terminal_error(self) -> bool {
        matches!(self, HaStatus::Error)
    }

    #[must_use]
    pub fn holds_claim(self) -> bool {
        matches!(self, HaStatus::Active | HaStatus::Standby)
    }

    /// Maps a persisted [`crate::NodeStatus`] onto the coordinator's own
    /// status space (used after a successful registration/check commit).
    #[must_use]
    pub fn from_node_status(status: crate::NodeStatus) -> Self {
        match status {
            crate::NodeStatus::Stopped => HaStatus::Stopped,
            crate::NodeStatus::Standby => HaStatus::Standby,
            crate::NodeStatus::Unavailable => HaStatus::Unavailable,
            crate::NodeStatus::Active => HaStatus::Active,
        }
    }

    /// The inverse of [`HaStatus::from_node_status`]; `None` for statuses
    /// that have no persisted counterpart.
    #[must_use]
    pub fn to_node_status(self) -> Option<crate::NodeStatus> {
        match self {
            HaStatus::Stopped => Some(crate::NodeStatus::Stopped),
            HaStatus::Standby => Some(crate::NodeStatus::Standby),
            HaStatus::Unavailable => Some(crate::NodeStatus::Unavailable),
            HaStatus::Active => Some(crate::NodeStatus::Active),
            HaStatus::Uninitialized | HaStatus::Unknown | HaStatus::Error => None,
        }
    }
}

impl Display for HaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeStatus;

    #[test]
    fn node_status_round_trips_through_ha_status() {
        for s in [
            NodeStatus::Stopped,
            NodeStatus::Standby,
            NodeStatus::Unavailable,
            NodeStatus::Active,
        ] {
            let ha = HaStatus::from_node_status(s);
            assert_eq!(ha.to_node_status(), Some(s));
        }
    }

    #[test]
    fn unknown_and_error_have_no_node_status() {
        assert_eq!(HaStatus::Unknown.to_node_status(), None);
        assert_eq!(HaStatus::Error.to_node_status(), None);
        assert_eq!(HaStatus::Uninitialized.to_node_status(), None);
    }
}
