//! Property registry: the single in-process authority over properties.
//!
//! # Responsibility
//! - Enforce address uniqueness and item-to-owner integrity.
//! - Apply each mutation as validate, mutate, audit, notify, persist.
//! - Hand out cloned, ordered read snapshots.
//! - Seed from an imported snapshot through the regular add path.
//!
//! # Invariants
//! - One mutex serializes every read and write against the aggregate.
//! - A failed operation leaves state unchanged and publishes exactly one
//!   `Failed` notification of the matching category.
//! - For one mutation, the entity notification is published before the
//!   snapshot is queued, so it precedes the storage `Started`/`Complete`.
//! - Listeners run on the mutating thread while the registry lock is held and
//!   must not call back into the registry.

use crate::audit::{AuditSink, ChangeKind, ObjectKind};
use crate::model::address::Address;
use crate::model::inventory_item::InventoryItem;
use crate::model::monitored_item::MonitoredItem;
use crate::model::property::{sorted_items, Property, PropertyItem};
use crate::model::validation::{EntityKind, ModelValidationError};
use crate::notify::{
    ChangeId, EntityEvent, Notification, NotificationBus, NotificationKind, Payload,
};
use crate::service::{MonitorError, MonitorResult};
use crate::store::{Snapshot, SnapshotStore, StoreError, StoreResult};
use chrono::NaiveDate;
use log::{info, warn};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

const SOURCE: &str = "property_monitor";

type PropertyMap = BTreeMap<Address, Property>;

/// Registry of properties and the items they own.
///
/// Construct one instance per process (or per test) and share it by `Arc`.
pub struct PropertyMonitor {
    properties: Mutex<PropertyMap>,
    bus: Arc<NotificationBus>,
    store: Arc<dyn SnapshotStore>,
    audit: Arc<dyn AuditSink>,
}

impl PropertyMonitor {
    /// Creates an empty registry.
    pub fn new(
        bus: Arc<NotificationBus>,
        store: Arc<dyn SnapshotStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            properties: Mutex::new(PropertyMap::new()),
            bus,
            store,
            audit,
        }
    }

    /// Creates a registry seeded from `store.load()`.
    ///
    /// Loading neither re-persists nor publishes entity notifications.
    ///
    /// # Errors
    /// - Any load failure from the store.
    /// - `InvalidData` when the stored snapshot repeats an address.
    pub fn open(
        bus: Arc<NotificationBus>,
        store: Arc<dyn SnapshotStore>,
        audit: Arc<dyn AuditSink>,
    ) -> StoreResult<Self> {
        let loaded = store.load()?;
        let mut properties = PropertyMap::new();
        for property in loaded {
            let address = property.address().clone();
            if properties.insert(address.clone(), property).is_some() {
                return Err(StoreError::InvalidData(format!(
                    "duplicate property `{address}`"
                )));
            }
        }
        info!(
            "event=registry_open module=service status=ok properties={}",
            properties.len()
        );

        Ok(Self {
            properties: Mutex::new(properties),
            bus,
            store,
            audit,
        })
    }

    /// Bus this registry publishes on.
    pub fn bus(&self) -> &Arc<NotificationBus> {
        &self.bus
    }

    /// Registers a new property together with any items it already owns.
    ///
    /// # Errors
    /// - `Duplicate` when the address is already registered.
    pub fn add_property(&self, property: Property) -> MonitorResult<()> {
        let mut properties = self.lock();
        Self::try_add_property(&mut properties, property.clone())
            .map(|()| {
                let description = property.to_string();
                self.commit(
                    &properties,
                    EntityKind::Property,
                    ChangeKind::Added,
                    &description,
                    Payload::Property(property),
                );
            })
            .map_err(|err| self.fail(EntityKind::Property, err))
    }

    /// Swaps the property at `old_address` for `replacement`.
    ///
    /// Items of the old property are not carried over.
    ///
    /// # Errors
    /// - `NotFound` when `old_address` is not registered.
    /// - `Duplicate` when `replacement`'s address is already registered.
    pub fn replace_property(
        &self,
        old_address: &Address,
        replacement: Property,
    ) -> MonitorResult<()> {
        let mut properties = self.lock();
        Self::try_replace_property(&mut properties, old_address, replacement.clone())
            .map(|()| {
                let description = replacement.to_string();
                self.commit(
                    &properties,
                    EntityKind::Property,
                    ChangeKind::Changed,
                    &description,
                    Payload::PropertyReplacement {
                        old: old_address.clone(),
                        new: replacement,
                    },
                );
            })
            .map_err(|err| self.fail(EntityKind::Property, err))
    }

    /// Removes and returns the property registered at `address`.
    ///
    /// # Errors
    /// - `NotFound` when `address` is not registered.
    pub fn remove_property(&self, address: &Address) -> MonitorResult<Property> {
        let mut properties = self.lock();
        match properties.remove(address) {
            Some(removed) => {
                let description = removed.to_string();
                self.commit(
                    &properties,
                    EntityKind::Property,
                    ChangeKind::Removed,
                    &description,
                    Payload::Property(removed.clone()),
                );
                Ok(removed)
            }
            None => Err(self.fail(EntityKind::Property, property_not_found(address))),
        }
    }

    /// Adds an item under the property named by its owner.
    ///
    /// # Errors
    /// - `Validation` when the item has no owner.
    /// - `UnknownOwner` when the owner is not registered.
    /// - `Duplicate` when the owner already holds an item with this description.
    pub fn add_item<I>(&self, item: I) -> MonitorResult<()>
    where
        I: PropertyItem + Into<Payload>,
    {
        let mut properties = self.lock();
        Self::try_add_item(&mut properties, item)
            .map(|added| {
                let description = added.to_string();
                self.commit(&properties, I::KIND, ChangeKind::Added, &description, added.into());
            })
            .map_err(|err| self.fail(I::KIND, err))
    }

    /// Replaces the owner's item that has the same description.
    ///
    /// # Errors
    /// - `Validation`, `UnknownOwner` as for `add_item`.
    /// - `NotFound` when the owner holds no item with this description.
    pub fn replace_item<I>(&self, item: I) -> MonitorResult<()>
    where
        I: PropertyItem + Into<Payload>,
    {
        let mut properties = self.lock();
        Self::try_replace_item(&mut properties, item)
            .map(|replaced| {
                let description = replaced.to_string();
                self.commit(
                    &properties,
                    I::KIND,
                    ChangeKind::Changed,
                    &description,
                    replaced.into(),
                );
            })
            .map_err(|err| self.fail(I::KIND, err))
    }

    /// Removes the owner's item with the same description and returns it
    /// detached from its property.
    ///
    /// # Errors
    /// - `Validation`, `UnknownOwner` as for `add_item`.
    /// - `NotFound` when the owner holds no item with this description.
    pub fn remove_item<I>(&self, item: &I) -> MonitorResult<I>
    where
        I: PropertyItem + Into<Payload>,
    {
        let mut properties = self.lock();
        Self::try_remove_item(&mut properties, item)
            .map(|removed| {
                let description = removed.to_string();
                self.commit(
                    &properties,
                    I::KIND,
                    ChangeKind::Removed,
                    &description,
                    removed.clone().into(),
                );
                removed
            })
            .map_err(|err| self.fail(I::KIND, err))
    }

    /// Records that the monitored item's action was performed on `when`.
    ///
    /// # Errors
    /// - `UnknownOwner` when `address` is not registered.
    /// - `NotFound` when the property has no monitored item `description`.
    pub fn record_action(
        &self,
        address: &Address,
        description: &str,
        when: NaiveDate,
    ) -> MonitorResult<()> {
        self.update_monitored_item(address, description, |item| item.action_performed(when))
    }

    /// Records that a reminder email for the monitored item went out on `when`.
    ///
    /// # Errors
    /// - Same as `record_action`.
    pub fn record_email_sent(
        &self,
        address: &Address,
        description: &str,
        when: NaiveDate,
    ) -> MonitorResult<()> {
        self.update_monitored_item(address, description, |item| {
            item.set_email_sent_on(Some(when))
        })
    }

    /// Empties the registry. Triggers one persistence cycle and no entity
    /// notification.
    pub fn clear(&self) {
        let mut properties = self.lock();
        let removed = properties.len();
        properties.clear();
        self.store.persist(Snapshot {
            change_id: None,
            properties: Vec::new(),
        });
        info!("event=registry_clear module=service status=ok removed={removed}");
    }

    /// Registers the properties of an imported snapshot in order.
    ///
    /// Each property goes through `add_property`, so it is audited, notified
    /// and persisted like any other addition. Import stops at the first
    /// rejected property; properties registered before it stay registered.
    ///
    /// # Errors
    /// - `Duplicate` for the first property whose address is already registered.
    pub fn import(&self, properties: Vec<Property>) -> MonitorResult<usize> {
        let mut imported = 0;
        for property in properties {
            self.add_property(property)?;
            imported += 1;
        }
        info!("event=registry_import module=service status=ok properties={imported}");
        Ok(imported)
    }

    /// Address-ordered copy of every registered property.
    pub fn properties(&self) -> Vec<Property> {
        self.lock().values().cloned().collect()
    }

    /// Copy of the property registered at `address`, if any.
    pub fn property(&self, address: &Address) -> Option<Property> {
        self.lock().get(address).cloned()
    }

    /// Monitored items of one property in schedule order.
    ///
    /// # Errors
    /// - `NotFound` when `address` is not registered.
    pub fn monitored_items_for(&self, address: &Address) -> MonitorResult<Vec<MonitoredItem>> {
        self.items_for(address)
    }

    /// Inventory items of one property in catalogue order.
    ///
    /// # Errors
    /// - `NotFound` when `address` is not registered.
    pub fn inventory_items_for(&self, address: &Address) -> MonitorResult<Vec<InventoryItem>> {
        self.items_for(address)
    }

    /// Every monitored item across all properties in schedule order.
    pub fn all_monitored_items(&self) -> Vec<MonitoredItem> {
        let properties = self.lock();
        let items = properties
            .values()
            .flat_map(|property| property.monitored_items().iter().cloned())
            .collect::<Vec<_>>();
        sorted_items(&items)
    }

    fn items_for<I: PropertyItem>(&self, address: &Address) -> MonitorResult<Vec<I>> {
        let properties = self.lock();
        match properties.get(address) {
            Some(property) => Ok(sorted_items(I::collection(property))),
            None => Err(self.fail(EntityKind::Property, property_not_found(address))),
        }
    }

    fn update_monitored_item(
        &self,
        address: &Address,
        description: &str,
        apply: impl FnOnce(&mut MonitoredItem),
    ) -> MonitorResult<()> {
        let mut properties = self.lock();
        let outcome = match properties.get_mut(address) {
            None => Err(MonitorError::UnknownOwner(address.clone())),
            Some(property) => match property.find_item::<MonitoredItem>(description) {
                None => Err(item_not_found::<MonitoredItem>(description)),
                Some(existing) => {
                    let mut updated = existing.clone();
                    apply(&mut updated);
                    property.replace_item(updated.clone());
                    Ok(updated)
                }
            },
        };

        outcome
            .map(|updated| {
                let description = updated.to_string();
                self.commit(
                    &properties,
                    EntityKind::MonitoredItem,
                    ChangeKind::Changed,
                    &description,
                    Payload::MonitoredItem(updated),
                );
            })
            .map_err(|err| self.fail(EntityKind::MonitoredItem, err))
    }

    fn try_add_property(properties: &mut PropertyMap, property: Property) -> MonitorResult<()> {
        if properties.contains_key(property.address()) {
            return Err(MonitorError::Duplicate {
                kind: EntityKind::Property,
                key: property.address().to_string(),
            });
        }
        properties.insert(property.address().clone(), property);
        Ok(())
    }

    fn try_replace_property(
        properties: &mut PropertyMap,
        old_address: &Address,
        replacement: Property,
    ) -> MonitorResult<()> {
        if !properties.contains_key(old_address) {
            return Err(property_not_found(old_address));
        }
        if properties.contains_key(replacement.address()) {
            return Err(MonitorError::Duplicate {
                kind: EntityKind::Property,
                key: replacement.address().to_string(),
            });
        }

        if let Some(old) = properties.remove(old_address) {
            let dropped = old.monitored_items().len() + old.inventory_items().len();
            if dropped > 0 {
                warn!(
                    "event=property_replace module=service status=ok \
                     dropped_items={dropped} old={old_address}"
                );
            }
        }
        properties.insert(replacement.address().clone(), replacement);
        Ok(())
    }

    fn try_add_item<I: PropertyItem>(properties: &mut PropertyMap, item: I) -> MonitorResult<I> {
        let property = resolve_owner(properties, &item)?;
        if property.find_item::<I>(item.key()).is_some() {
            return Err(MonitorError::Duplicate {
                kind: I::KIND,
                key: item.key().to_string(),
            });
        }
        property.insert_item(item.clone());
        Ok(item)
    }

    fn try_replace_item<I: PropertyItem>(
        properties: &mut PropertyMap,
        item: I,
    ) -> MonitorResult<I> {
        let property = resolve_owner(properties, &item)?;
        if property.replace_item(item.clone()) {
            Ok(item)
        } else {
            Err(item_not_found::<I>(item.key()))
        }
    }

    fn try_remove_item<I: PropertyItem>(
        properties: &mut PropertyMap,
        item: &I,
    ) -> MonitorResult<I> {
        let property = resolve_owner(properties, item)?;
        property
            .remove_item::<I>(item.key())
            .ok_or_else(|| item_not_found::<I>(item.key()))
    }

    /// Audits, notifies and persists one applied mutation.
    fn commit(
        &self,
        properties: &PropertyMap,
        kind: EntityKind,
        change: ChangeKind,
        description: &str,
        payload: Payload,
    ) {
        let change_id: ChangeId = Uuid::new_v4();
        self.audit.record(change, ObjectKind::from(kind), description);

        let snapshot = Snapshot {
            change_id: Some(change_id),
            properties: properties.values().cloned().collect(),
        };
        let event = entity_event(change);
        self.bus.publish(
            Notification::new(NotificationKind::for_entity(kind, event), SOURCE)
                .with_payload(payload)
                .with_change_id(Some(change_id)),
        );
        self.store.persist(snapshot);

        info!(
            "event=registry_change module=service status=ok kind={} change={change} \
             change_id={change_id}",
            kind.as_str()
        );
    }

    /// Mirrors `err` as a `Failed` notification and hands it back.
    fn fail(&self, kind: EntityKind, err: MonitorError) -> MonitorError {
        warn!(
            "event=registry_change module=service status=error kind={} error={err}",
            kind.as_str()
        );
        self.bus.publish(
            Notification::new(NotificationKind::for_entity(kind, EntityEvent::Failed), SOURCE)
                .with_payload(Payload::Error(err.to_string())),
        );
        err
    }

    fn lock(&self) -> MutexGuard<'_, PropertyMap> {
        self.properties
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn resolve_owner<'a, I: PropertyItem>(
    properties: &'a mut PropertyMap,
    item: &I,
) -> MonitorResult<&'a mut Property> {
    let owner = item.owner_address().ok_or_else(|| {
        MonitorError::Validation(ModelValidationError::MissingOwner {
            kind: I::KIND,
            description: item.key().to_string(),
        })
    })?;
    properties
        .get_mut(owner)
        .ok_or_else(|| MonitorError::UnknownOwner(owner.clone()))
}

fn entity_event(change: ChangeKind) -> EntityEvent {
    match change {
        ChangeKind::Added => EntityEvent::Add,
        ChangeKind::Changed => EntityEvent::Changed,
        ChangeKind::Removed => EntityEvent::Removed,
    }
}

fn property_not_found(address: &Address) -> MonitorError {
    MonitorError::NotFound {
        kind: EntityKind::Property,
        key: address.to_string(),
    }
}

fn item_not_found<I: PropertyItem>(description: &str) -> MonitorError {
    MonitorError::NotFound {
        kind: I::KIND,
        key: description.to_string(),
    }
}
