//! Property aggregate and the item kinds it owns.
//!
//! # Responsibility
//! - Own the monitored and inventory item collections of one address.
//! - Give the registry one generic view over both item kinds.
//!
//! # Invariants
//! - No two items of the same kind under one property share a description.
//! - Items held by a property always carry that property's address as owner.
//! - Collections change only through crate-internal methods driven by the
//!   registry.

use crate::model::address::Address;
use crate::model::inventory_item::InventoryItem;
use crate::model::monitored_item::MonitoredItem;
use crate::model::validation::EntityKind;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// Physical property identified by its postal address.
///
/// Equality and ordering use the address only.
#[derive(Debug, Clone)]
pub struct Property {
    address: Address,
    monitored_items: Vec<MonitoredItem>,
    inventory_items: Vec<InventoryItem>,
}

impl Property {
    /// Creates a property with no items.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            monitored_items: Vec::new(),
            inventory_items: Vec::new(),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn monitored_items(&self) -> &[MonitoredItem] {
        &self.monitored_items
    }

    pub fn inventory_items(&self) -> &[InventoryItem] {
        &self.inventory_items
    }

    /// True when any monitored item is overdue as of `as_of`.
    pub fn has_overdue_items(&self, as_of: NaiveDate) -> bool {
        self.monitored_items.iter().any(|item| item.overdue(as_of))
    }

    /// True when any monitored item has its notice due as of `as_of`.
    pub fn has_notices_due(&self, as_of: NaiveDate) -> bool {
        self.monitored_items.iter().any(|item| item.notice_due(as_of))
    }

    pub(crate) fn find_item<I: PropertyItem>(&self, description: &str) -> Option<&I> {
        I::collection(self)
            .iter()
            .find(|item| item.key() == description)
    }

    /// Appends an item, re-pointing its owner at this property.
    ///
    /// Callers must have rejected duplicate descriptions already.
    pub(crate) fn insert_item<I: PropertyItem>(&mut self, mut item: I) {
        item.attach(self.address.clone());
        I::collection_mut(self).push(item);
    }

    /// Replaces the item with the same description. Returns false when absent.
    pub(crate) fn replace_item<I: PropertyItem>(&mut self, mut item: I) -> bool {
        item.attach(self.address.clone());
        let slot = I::collection_mut(self)
            .iter_mut()
            .find(|existing| existing.key() == item.key());
        match slot {
            Some(existing) => {
                *existing = item;
                true
            }
            None => false,
        }
    }

    /// Removes the item with `description`, detaching it from this property.
    pub(crate) fn remove_item<I: PropertyItem>(&mut self, description: &str) -> Option<I> {
        let items = I::collection_mut(self);
        let index = items.iter().position(|item| item.key() == description)?;
        let mut removed = items.remove(index);
        removed.detach();
        Some(removed)
    }
}

impl PartialEq for Property {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for Property {}

impl PartialOrd for Property {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Property {
    fn cmp(&self, other: &Self) -> Ordering {
        self.address.cmp(&other.address)
    }
}

impl Display for Property {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.address)
    }
}

mod private {
    pub trait Sealed {}

    impl Sealed for super::MonitoredItem {}
    impl Sealed for super::InventoryItem {}
}

/// Item kinds a property owns. Sealed to `MonitoredItem` and `InventoryItem`.
pub trait PropertyItem: private::Sealed + Clone + Display + Send + Sync + 'static {
    /// Entity category used for notifications, audit and errors.
    const KIND: EntityKind;

    /// Identity key within the owning property.
    fn key(&self) -> &str;

    /// Address of the owning property, if attached.
    fn owner_address(&self) -> Option<&Address>;

    fn attach(&mut self, owner: Address);

    fn detach(&mut self);

    /// Natural order of this kind.
    fn natural_order(a: &Self, b: &Self) -> Ordering;

    #[doc(hidden)]
    fn collection(property: &Property) -> &Vec<Self>;

    #[doc(hidden)]
    fn collection_mut(property: &mut Property) -> &mut Vec<Self>;
}

impl PropertyItem for MonitoredItem {
    const KIND: EntityKind = EntityKind::MonitoredItem;

    fn key(&self) -> &str {
        self.description()
    }

    fn owner_address(&self) -> Option<&Address> {
        self.owner()
    }

    fn attach(&mut self, owner: Address) {
        self.set_owner(owner);
    }

    fn detach(&mut self) {
        self.clear_owner();
    }

    fn natural_order(a: &Self, b: &Self) -> Ordering {
        MonitoredItem::schedule_order(a, b)
    }

    fn collection(property: &Property) -> &Vec<Self> {
        &property.monitored_items
    }

    fn collection_mut(property: &mut Property) -> &mut Vec<Self> {
        &mut property.monitored_items
    }
}

impl PropertyItem for InventoryItem {
    const KIND: EntityKind = EntityKind::InventoryItem;

    fn key(&self) -> &str {
        self.description()
    }

    fn owner_address(&self) -> Option<&Address> {
        self.owner()
    }

    fn attach(&mut self, owner: Address) {
        self.set_owner(owner);
    }

    fn detach(&mut self) {
        self.clear_owner();
    }

    fn natural_order(a: &Self, b: &Self) -> Ordering {
        InventoryItem::catalogue_order(a, b)
    }

    fn collection(property: &Property) -> &Vec<Self> {
        &property.inventory_items
    }

    fn collection_mut(property: &mut Property) -> &mut Vec<Self> {
        &mut property.inventory_items
    }
}

/// Returns a sorted copy of `items` in the kind's natural order.
pub fn sorted_items<I: PropertyItem>(items: &[I]) -> Vec<I> {
    let mut copy = items.to_vec();
    copy.sort_by(I::natural_order);
    copy
}

#[cfg(test)]
mod tests {
    use super::Property;
    use crate::model::address::Address;
    use crate::model::monitored_item::MonitoredItem;
    use crate::model::period::Period;
    use chrono::NaiveDate;

    fn address() -> Address {
        Address::parse("CW3 9ST", ["99 The Street", "The Town"]).unwrap()
    }

    #[test]
    fn insert_points_owner_at_property_and_remove_detaches() {
        let mut property = Property::new(address());
        let item = MonitoredItem::new(
            "boiler",
            Period::Yearly,
            1,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            1,
            Period::Weekly,
        )
        .unwrap();

        property.insert_item(item);
        assert_eq!(property.monitored_items()[0].owner(), Some(&address()));

        let removed = property.remove_item::<MonitoredItem>("boiler").unwrap();
        assert!(removed.owner().is_none());
        assert!(property.monitored_items().is_empty());
    }

    #[test]
    fn overdue_predicates_follow_items() {
        let mut property = Property::new(address());
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        property.insert_item(
            MonitoredItem::new("alarm", Period::Monthly, 1, start, 1, Period::Weekly).unwrap(),
        );

        assert!(!property.has_overdue_items(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()));
        assert!(property.has_overdue_items(NaiveDate::from_ymd_opt(2025, 2, 2).unwrap()));
        assert!(property.has_notices_due(NaiveDate::from_ymd_opt(2025, 1, 26).unwrap()));
    }
}
