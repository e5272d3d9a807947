//! Read-only reporting views over the registry.
//!
//! # Invariants
//! - Queries never mutate the registry and work on cloned snapshots.
//! - Date queries match `time_for_next_action`/`time_for_next_notice`
//!   exactly, never "on or before".

use crate::model::address::Address;
use crate::model::inventory_item::InventoryItem;
use crate::model::monitored_item::MonitoredItem;
use crate::model::property::Property;
use crate::service::property_monitor::PropertyMonitor;
use crate::service::MonitorResult;
use chrono::{Local, NaiveDate};

/// Query helper bound to one registry.
pub struct PropertySelect<'a> {
    monitor: &'a PropertyMonitor,
}

impl<'a> PropertySelect<'a> {
    pub fn new(monitor: &'a PropertyMonitor) -> Self {
        Self { monitor }
    }

    /// Properties with at least one monitored item overdue today.
    pub fn with_overdue_items(&self) -> Vec<Property> {
        self.with_overdue_items_as_of(today())
    }

    /// Properties with at least one monitored item overdue as of `as_of`.
    pub fn with_overdue_items_as_of(&self, as_of: NaiveDate) -> Vec<Property> {
        self.monitor
            .properties()
            .into_iter()
            .filter(|property| property.has_overdue_items(as_of))
            .collect()
    }

    /// Properties with at least one notice due today.
    pub fn with_overdue_notices(&self) -> Vec<Property> {
        self.with_overdue_notices_as_of(today())
    }

    pub fn with_overdue_notices_as_of(&self, as_of: NaiveDate) -> Vec<Property> {
        self.monitor
            .properties()
            .into_iter()
            .filter(|property| property.has_notices_due(as_of))
            .collect()
    }

    /// Monitored items whose next action falls exactly on `date`.
    pub fn overdue_items_for(&self, date: NaiveDate) -> Vec<MonitoredItem> {
        self.monitor
            .all_monitored_items()
            .into_iter()
            .filter(|item| item.time_for_next_action() == date)
            .collect()
    }

    /// Monitored items whose notice falls exactly on `date`.
    pub fn notified_items_for(&self, date: NaiveDate) -> Vec<MonitoredItem> {
        self.monitor
            .all_monitored_items()
            .into_iter()
            .filter(|item| item.time_for_next_notice() == date)
            .collect()
    }

    pub fn monitored_items_for(&self, address: &Address) -> MonitorResult<Vec<MonitoredItem>> {
        self.monitor.monitored_items_for(address)
    }

    pub fn inventory_items_for(&self, address: &Address) -> MonitorResult<Vec<InventoryItem>> {
        self.monitor.inventory_items_for(address)
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}
