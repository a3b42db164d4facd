//! The audit log sink contract (spec §1: out of scope, referenced only
//! by the interface it exposes).
//!
//! Supplemented from `ha_manager.c`'s per-field diffing around node
//! registration and status transitions: every committed change to a
//! node row is broken down into one [`AuditEntry`] per changed field,
//! not one entry per statement, so a consumer can reconstruct exactly
//! what changed without re-diffing rows itself.

use nodewarden_types::NodeId;

use crate::db::DbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

/// One changed column, before committing the audit entries for a
/// transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditField {
    pub name: &'static str,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    /// `None` for entries about the configuration row rather than a
    /// specific node (e.g. a failover-delay change).
    pub node_id: Option<NodeId>,
    pub action: AuditAction,
    pub fields: Vec<AuditField>,
}

/// A sink that records audit entries. Entries are buffered by the
/// coordinator for the lifetime of a transaction and flushed only once
/// that transaction commits — a rolled-back transaction must never
/// reach `emit`.
pub trait AuditSink: Send + Sync {
    fn emit(&mut self, entries: &[AuditEntry]) -> Result<(), DbError>;
}

/// An [`AuditSink`] that keeps every emitted entry in memory, for tests
/// and for deployments that have not configured a real sink.
#[derive(Default)]
pub struct InMemoryAuditSink {
    entries: Vec<AuditEntry>,
}

impl InMemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&mut self, entries: &[AuditEntry]) -> Result<(), DbError> {
        self.entries.extend_from_slice(entries);
        Ok(())
    }
}

/// An [`AuditSink`] that discards everything, used when `auditlog` is
/// disabled in configuration.
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn emit(&mut self, _entries: &[AuditEntry]) -> Result<(), DbError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_sink_accumulates_across_calls() {
        let mut sink = InMemoryAuditSink::new();
        let entry = AuditEntry {
            node_id: Some(NodeId::generate()),
            action: AuditAction::Update,
            fields: vec![AuditField {
                name: "status",
                old_value: Some("standby".into()),
                new_value: Some("active".into()),
            }],
        };
        sink.emit(std::slice::from_ref(&entry)).unwrap();
        sink.emit(std::slice::from_ref(&entry)).unwrap();
        assert_eq!(sink.entries().len(), 2);
    }

    #[test]
    fn null_sink_discards() {
        let mut sink = NullAuditSink;
        let entry = AuditEntry {
            node_id: Some(NodeId::generate()),
            action: AuditAction::Create,
            fields: vec![],
        };
        sink.emit(&[entry]).unwrap();
    }
}
