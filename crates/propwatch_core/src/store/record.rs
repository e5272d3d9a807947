//! Serialized record shape shared by the SQLite store and the JSON codec.
//!
//! # Invariants
//! - Absent or empty optional fields are omitted, never stored empty.
//! - `time_for_next_action`/`time_for_next_notice` are not part of a record.
//! - Converting a record back into a model re-runs every model validation
//!   and rejects duplicate item descriptions within one property.

use crate::model::address::{Address, PostCode};
use crate::model::inventory_item::InventoryItem;
use crate::model::monitored_item::MonitoredItem;
use crate::model::period::Period;
use crate::model::property::{Property, PropertyItem};
use crate::store::{StoreError, StoreResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRecord {
    /// Address lines in display order.
    pub address: Vec<String>,
    pub postcode: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub monitored_items: Vec<MonitoredItemRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inventory_items: Vec<InventoryItemRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredItemRecord {
    pub description: String,
    pub period_for_next_action: Period,
    pub notice_every: u32,
    pub last_actioned: NaiveDate,
    pub advance_notice: u32,
    pub period_for_next_notice: Period,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_sent_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItemRecord {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDocument {
    properties: Vec<PropertyRecord>,
}

impl From<&Property> for PropertyRecord {
    fn from(property: &Property) -> Self {
        Self {
            address: property.address().lines().to_vec(),
            postcode: property.address().post_code().to_string(),
            monitored_items: property
                .monitored_items()
                .iter()
                .map(MonitoredItemRecord::from)
                .collect(),
            inventory_items: property
                .inventory_items()
                .iter()
                .map(InventoryItemRecord::from)
                .collect(),
        }
    }
}

impl From<&MonitoredItem> for MonitoredItemRecord {
    fn from(item: &MonitoredItem) -> Self {
        Self {
            description: item.description().to_string(),
            period_for_next_action: item.period_for_next_action(),
            notice_every: item.notice_every(),
            last_actioned: item.last_action_performed(),
            advance_notice: item.advance_notice(),
            period_for_next_notice: item.period_for_next_notice(),
            email_sent_on: item.email_sent_on(),
        }
    }
}

impl From<&InventoryItem> for InventoryItemRecord {
    fn from(item: &InventoryItem) -> Self {
        Self {
            description: item.description().to_string(),
            manufacturer: non_empty(item.manufacturer()),
            model: non_empty(item.model()),
            serial_number: non_empty(item.serial_number()),
            supplier: non_empty(item.supplier()),
            purchase_date: item.purchase_date(),
        }
    }
}

impl PropertyRecord {
    /// Rebuilds the property with every item owned by it.
    pub fn into_property(self) -> StoreResult<Property> {
        let address = Address::new(PostCode::new(&self.postcode)?, &self.address)?;
        let mut property = Property::new(address);

        let monitored = self
            .monitored_items
            .into_iter()
            .map(MonitoredItemRecord::into_item)
            .collect::<StoreResult<Vec<_>>>()?;
        insert_unique(&mut property, monitored)?;

        let inventory = self
            .inventory_items
            .into_iter()
            .map(InventoryItemRecord::into_item)
            .collect::<StoreResult<Vec<_>>>()?;
        insert_unique(&mut property, inventory)?;

        Ok(property)
    }
}

impl MonitoredItemRecord {
    pub fn into_item(self) -> StoreResult<MonitoredItem> {
        let item = MonitoredItem::new(
            self.description,
            self.period_for_next_action,
            self.notice_every,
            self.last_actioned,
            self.advance_notice,
            self.period_for_next_notice,
        )?;
        Ok(item.with_email_sent_on(self.email_sent_on))
    }
}

impl InventoryItemRecord {
    pub fn into_item(self) -> StoreResult<InventoryItem> {
        Ok(InventoryItem::new(
            self.description,
            self.manufacturer.unwrap_or_default(),
            self.model.unwrap_or_default(),
            self.serial_number.unwrap_or_default(),
            self.supplier.unwrap_or_default(),
            self.purchase_date,
        )?)
    }
}

/// Encodes properties as a JSON snapshot document.
pub fn encode_snapshot(properties: &[Property]) -> StoreResult<Vec<u8>> {
    let document = SnapshotDocument {
        properties: properties.iter().map(PropertyRecord::from).collect(),
    };
    Ok(serde_json::to_vec_pretty(&document)?)
}

/// Decodes a JSON snapshot document. Any malformed record fails the decode.
pub fn decode_snapshot(bytes: &[u8]) -> StoreResult<Vec<Property>> {
    let document: SnapshotDocument = serde_json::from_slice(bytes)?;
    let properties = document
        .properties
        .into_iter()
        .map(PropertyRecord::into_property)
        .collect::<StoreResult<Vec<_>>>()?;

    let mut seen = HashSet::new();
    for property in &properties {
        if !seen.insert(property.address().clone()) {
            return Err(StoreError::InvalidData(format!(
                "duplicate property `{}`",
                property.address()
            )));
        }
    }
    Ok(properties)
}

fn insert_unique<I: PropertyItem>(property: &mut Property, items: Vec<I>) -> StoreResult<()> {
    for item in items {
        if property.find_item::<I>(item.key()).is_some() {
            return Err(StoreError::InvalidData(format!(
                "duplicate {} `{}` under `{}`",
                I::KIND,
                item.key(),
                property.address()
            )));
        }
        property.insert_item(item);
    }
    Ok(())
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_snapshot, encode_snapshot, InventoryItemRecord};
    use crate::model::address::Address;
    use crate::model::inventory_item::InventoryItem;
    use crate::model::property::Property;
    use crate::store::StoreError;

    #[test]
    fn empty_inventory_fields_are_omitted() {
        let item = InventoryItem::new("kettle", "Acme", "", "", "", None).unwrap();
        let json = serde_json::to_value(InventoryItemRecord::from(&item)).unwrap();
        assert_eq!(json, serde_json::json!({"description": "kettle", "manufacturer": "Acme"}));
    }

    #[test]
    fn decode_rejects_duplicate_item_descriptions() {
        let document = serde_json::json!({
            "properties": [{
                "address": ["1 Lane"],
                "postcode": "CW3 9ST",
                "inventory_items": [
                    {"description": "fridge"},
                    {"description": "fridge"}
                ]
            }]
        });
        let bytes = serde_json::to_vec(&document).unwrap();
        let err = decode_snapshot(&bytes).unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)), "unexpected error: {err}");
    }

    #[test]
    fn decode_rejects_invalid_postcode() {
        let bytes = br#"{"properties":[{"address":["1 Lane"],"postcode":"nope"}]}"#;
        let err = decode_snapshot(bytes).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn encoded_snapshot_decodes_to_same_addresses() {
        let property = Property::new(Address::parse("CW3 9SU", ["2 Lane"]).unwrap());
        let bytes = encode_snapshot(std::slice::from_ref(&property)).unwrap();
        let decoded = decode_snapshot(&bytes).unwrap();
        assert_eq!(decoded, vec![property]);
    }
}
