//! Owned asset record.

use crate::model::address::Address;
use crate::model::validation::{require_description, EntityKind, ModelValidationError};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

/// Asset attached to a property. No derived state.
///
/// Equality and hashing use `description` only.
#[derive(Debug, Clone)]
pub struct InventoryItem {
    description: String,
    manufacturer: String,
    model: String,
    serial_number: String,
    supplier: String,
    purchase_date: Option<NaiveDate>,
    owner: Option<Address>,
}

impl InventoryItem {
    /// Creates a validated inventory item. Free-text fields may be empty.
    pub fn new(
        description: impl Into<String>,
        manufacturer: impl Into<String>,
        model: impl Into<String>,
        serial_number: impl Into<String>,
        supplier: impl Into<String>,
        purchase_date: Option<NaiveDate>,
    ) -> Result<Self, ModelValidationError> {
        Ok(Self {
            description: require_description(EntityKind::InventoryItem, description)?,
            manufacturer: manufacturer.into(),
            model: model.into(),
            serial_number: serial_number.into(),
            supplier: supplier.into(),
            purchase_date,
            owner: None,
        })
    }

    pub fn with_owner(mut self, owner: Address) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn manufacturer(&self) -> &str {
        &self.manufacturer
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn supplier(&self) -> &str {
        &self.supplier
    }

    pub fn purchase_date(&self) -> Option<NaiveDate> {
        self.purchase_date
    }

    pub fn owner(&self) -> Option<&Address> {
        self.owner.as_ref()
    }

    pub fn set_owner(&mut self, owner: Address) {
        self.owner = Some(owner);
    }

    pub fn clear_owner(&mut self) {
        self.owner = None;
    }

    pub fn set_manufacturer(&mut self, value: impl Into<String>) {
        self.manufacturer = value.into();
    }

    pub fn set_model(&mut self, value: impl Into<String>) {
        self.model = value.into();
    }

    pub fn set_serial_number(&mut self, value: impl Into<String>) {
        self.serial_number = value.into();
    }

    pub fn set_supplier(&mut self, value: impl Into<String>) {
        self.supplier = value.into();
    }

    pub fn set_purchase_date(&mut self, value: Option<NaiveDate>) {
        self.purchase_date = value;
    }

    /// Catalogue order: manufacturer, then model, then serial number.
    pub fn catalogue_order(a: &Self, b: &Self) -> Ordering {
        a.manufacturer
            .cmp(&b.manufacturer)
            .then_with(|| a.model.cmp(&b.model))
            .then_with(|| a.serial_number.cmp(&b.serial_number))
    }
}

impl PartialEq for InventoryItem {
    fn eq(&self, other: &Self) -> bool {
        self.description == other.description
    }
}

impl Eq for InventoryItem {}

impl Hash for InventoryItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.description.hash(state);
    }
}

impl Display for InventoryItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, {}, {}, {}",
            self.description, self.manufacturer, self.model, self.serial_number
        )
    }
}
