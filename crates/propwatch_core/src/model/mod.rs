//! Domain model for properties and the items they own.
//!
//! # Responsibility
//! - Define validated value types and aggregates used by the registry.
//! - Own the calendar period algebra behind recurring schedules.
//!
//! # Invariants
//! - A property is identified by its `Address`.
//! - Items are identified by description within their owning property.
//! - Derived schedule dates are never set directly, only recomputed.

pub mod address;
pub mod inventory_item;
pub mod monitored_item;
pub mod period;
pub mod property;
pub mod validation;
