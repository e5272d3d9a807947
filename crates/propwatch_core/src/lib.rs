//! Core domain logic for propwatch.
//! This crate is the single source of truth for registry and schedule invariants.

pub mod audit;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod notify;
pub mod service;
pub mod store;

pub use audit::{AuditSink, ChangeKind, LogAuditSink, NoopAuditSink, ObjectKind};
pub use config::{ConfigError, MonitorConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::address::{Address, PostCode};
pub use model::inventory_item::InventoryItem;
pub use model::monitored_item::MonitoredItem;
pub use model::period::Period;
pub use model::property::{Property, PropertyItem};
pub use model::validation::{EntityKind, ModelValidationError};
pub use notify::{
    ChangeId, EntityEvent, ListenerId, Notification, NotificationBus, NotificationKind,
    NotificationListener, Payload, StorageOperation, StoreState,
};
pub use service::property_monitor::PropertyMonitor;
pub use service::property_select::PropertySelect;
pub use service::{MonitorError, MonitorResult};
pub use store::{Snapshot, SnapshotStore, SqliteSnapshotStore, StoreError, StoreResult};

/// Minimal health-check API.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
