//! Fire-and-forget audit trail for registry changes.
//!
//! # Responsibility
//! - Define the audit sink contract used after every successful mutation.
//! - Provide a log-backed sink writing to the `audit` log target.
//!
//! # Invariants
//! - Sinks never report failure back to the registry.

use crate::model::validation::EntityKind;
use log::info;
use std::fmt::{Display, Formatter};

/// Log target used by `LogAuditSink`.
pub const AUDIT_LOG_TARGET: &str = "audit";

/// Kind of change being audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Changed,
    Removed,
}

impl ChangeKind {
    /// Stable audit label (`added|changed|deleted`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Changed => "changed",
            Self::Removed => "deleted",
        }
    }
}

impl Display for ChangeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of object being audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Property,
    MonitoredItem,
    InventoryItem,
}

impl ObjectKind {
    /// Stable audit label (`property|event|item`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Property => "property",
            Self::MonitoredItem => "event",
            Self::InventoryItem => "item",
        }
    }
}

impl From<EntityKind> for ObjectKind {
    fn from(value: EntityKind) -> Self {
        match value {
            EntityKind::Property => Self::Property,
            EntityKind::MonitoredItem => Self::MonitoredItem,
            EntityKind::InventoryItem => Self::InventoryItem,
        }
    }
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives one record per successful registry mutation.
pub trait AuditSink: Send + Sync {
    fn record(&self, change: ChangeKind, object: ObjectKind, description: &str);
}

/// Writes audit records through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, change: ChangeKind, object: ObjectKind, description: &str) {
        info!(target: AUDIT_LOG_TARGET, "{}", audit_line(change, object, description));
    }
}

/// Formats one audit record; `description` is quoted so it stays one value.
fn audit_line(change: ChangeKind, object: ObjectKind, description: &str) -> String {
    format!(
        "event=audit module=audit change={change} object={object} description={description:?}"
    )
}

/// Discards audit records.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _change: ChangeKind, _object: ObjectKind, _description: &str) {}
}
