//! Registry and query services over the property model.
//!
//! # Responsibility
//! - Serialize every registry mutation behind one lock.
//! - Fan each outcome out to audit, notifications and the snapshot store.
//! - Derive read-only views for reporting.

pub mod property_monitor;
pub mod property_select;

use crate::model::address::Address;
use crate::model::validation::{EntityKind, ModelValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type MonitorResult<T> = Result<T, MonitorError>;

/// Synchronous registry failure. Each one is mirrored by a `Failed`
/// notification of the matching category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    Validation(ModelValidationError),
    /// An entity with the same identity is already registered.
    Duplicate { kind: EntityKind, key: String },
    /// The item's owning property is not registered.
    UnknownOwner(Address),
    /// The referenced entity is not where an update or removal expected it.
    NotFound { kind: EntityKind, key: String },
}

impl Display for MonitorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Duplicate { kind, key } => write!(f, "{kind} `{key}` already exists"),
            Self::UnknownOwner(address) => write!(f, "property `{address}` was not known"),
            Self::NotFound { kind, key } => write!(f, "{kind} `{key}` was not known"),
        }
    }
}

impl Error for MonitorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ModelValidationError> for MonitorError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}
