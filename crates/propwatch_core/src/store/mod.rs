//! Durable snapshot storage for the property registry.
//!
//! # Responsibility
//! - Define the write-behind persistence contract the registry depends on.
//! - Provide the SQLite-backed store and the JSON record codec.
//!
//! # Invariants
//! - Every `persist` call produces exactly one storage `Started` notification
//!   followed by exactly one `Complete` or `Failed`.
//! - `load` either reconstructs every stored property or fails as a whole.
//! - Derived schedule dates are never stored; they are recomputed on load.

pub mod record;
mod sqlite_store;

pub use sqlite_store::SqliteSnapshotStore;

use crate::db::DbError;
use crate::model::property::Property;
use crate::model::validation::ModelValidationError;
use crate::notify::ChangeId;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-layer failure. Persist failures surface only as notifications.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Codec(serde_json::Error),
    /// Stored record violates a model invariant.
    Validation(ModelValidationError),
    /// Stored data cannot be interpreted.
    InvalidData(String),
    /// The background writer is no longer accepting snapshots.
    WorkerUnavailable,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Codec(err) => write!(f, "snapshot codec failed: {err}"),
            Self::Validation(err) => write!(f, "invalid stored record: {err}"),
            Self::InvalidData(message) => write!(f, "invalid stored data: {message}"),
            Self::WorkerUnavailable => write!(f, "snapshot writer is not running"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Codec(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::InvalidData(_) | Self::WorkerUnavailable => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Db(DbError::Io(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Codec(value)
    }
}

impl From<ModelValidationError> for StoreError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Full registry state handed to a store after one mutation.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Registry change that produced this snapshot; `None` for `clear`.
    pub change_id: Option<ChangeId>,
    /// Address-ordered properties with their items.
    pub properties: Vec<Property>,
}

/// Persistence contract between the registry and a durable store.
pub trait SnapshotStore: Send + Sync {
    /// Queues `snapshot` for writing and returns immediately.
    ///
    /// Completion is reported on the notification bus only.
    fn persist(&self, snapshot: Snapshot);

    /// Reads the last persisted snapshot with owner references restored.
    fn load(&self) -> StoreResult<Vec<Property>>;
}
