//! Validation errors raised by model constructors and setters.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Entity kind named in validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Property,
    MonitoredItem,
    InventoryItem,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Property => "property",
            Self::MonitoredItem => "monitored item",
            Self::InventoryItem => "inventory item",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain validation failure for model values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    /// Identity description is empty or whitespace only.
    BlankDescription(EntityKind),
    /// Interval count must be at least one.
    ZeroInterval { field: &'static str },
    /// Postcode does not match the expected outward/inward shape.
    InvalidPostCode(String),
    /// Address has no non-blank lines.
    EmptyAddress,
    /// Item is not attached to any property.
    MissingOwner {
        kind: EntityKind,
        description: String,
    },
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankDescription(kind) => write!(f, "{kind}: description not specified"),
            Self::ZeroInterval { field } => write!(f, "{field} must be at least 1"),
            Self::InvalidPostCode(value) => write!(f, "invalid postcode `{value}`"),
            Self::EmptyAddress => write!(f, "address must contain at least one line"),
            Self::MissingOwner { kind, description } => {
                write!(f, "{kind} `{description}` has no owning property")
            }
        }
    }
}

impl Error for ModelValidationError {}

pub(crate) fn require_description(
    kind: EntityKind,
    description: impl Into<String>,
) -> Result<String, ModelValidationError> {
    let description = description.into();
    if description.trim().is_empty() {
        return Err(ModelValidationError::BlankDescription(kind));
    }
    Ok(description)
}

pub(crate) fn require_interval(
    field: &'static str,
    value: u32,
) -> Result<u32, ModelValidationError> {
    if value < 1 {
        return Err(ModelValidationError::ZeroInterval { field });
    }
    Ok(value)
}
