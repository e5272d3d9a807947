//! Typed notifications decoupling registry mutators from observers.
//!
//! # Responsibility
//! - Define the notification envelope and its category/outcome kinds.
//! - Provide the in-process publish/subscribe bus.
//!
//! # Invariants
//! - Delivery is synchronous fan-out to listeners registered at publish time.
//! - No buffering, retention, or replay.

mod bus;

pub use bus::{ListenerId, NotificationBus, NotificationListener};

use crate::model::address::Address;
use crate::model::inventory_item::InventoryItem;
use crate::model::monitored_item::MonitoredItem;
use crate::model::property::Property;
use crate::model::validation::EntityKind;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Correlates an entity notification with the storage cycle it triggered.
pub type ChangeId = Uuid;

/// Outcome of a registry operation on one entity category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityEvent {
    Add,
    Changed,
    Removed,
    Failed,
}

/// Storage operation reported on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOperation {
    Store,
    Load,
}

/// Lifecycle state of one storage operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreState {
    Started,
    Complete,
    Failed,
}

impl StoreState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Category plus outcome of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Property(EntityEvent),
    MonitoredItem(EntityEvent),
    InventoryItem(EntityEvent),
    Storage(StorageOperation, StoreState),
}

impl NotificationKind {
    pub fn for_entity(kind: EntityKind, event: EntityEvent) -> Self {
        match kind {
            EntityKind::Property => Self::Property(event),
            EntityKind::MonitoredItem => Self::MonitoredItem(event),
            EntityKind::InventoryItem => Self::InventoryItem(event),
        }
    }

    /// Entity outcome, or `None` for storage notifications.
    pub fn entity_event(self) -> Option<EntityEvent> {
        match self {
            Self::Property(event) | Self::MonitoredItem(event) | Self::InventoryItem(event) => {
                Some(event)
            }
            Self::Storage(..) => None,
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::Property(EntityEvent::Failed)
                | Self::MonitoredItem(EntityEvent::Failed)
                | Self::InventoryItem(EntityEvent::Failed)
                | Self::Storage(_, StoreState::Failed)
        )
    }

    /// Stable category label (`property|monitoreditem|inventoryitem|storage`).
    pub fn category(self) -> &'static str {
        match self {
            Self::Property(_) => "property",
            Self::MonitoredItem(_) => "monitoreditem",
            Self::InventoryItem(_) => "inventoryitem",
            Self::Storage(..) => "storage",
        }
    }
}

impl Display for NotificationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(operation, state) => {
                write!(f, "{}:{operation:?}:{state:?}", self.category())
            }
            other => match other.entity_event() {
                Some(event) => write!(f, "{}:{event:?}", other.category()),
                None => f.write_str(other.category()),
            },
        }
    }
}

/// Subject carried by a notification.
#[derive(Debug, Clone)]
pub enum Payload {
    Property(Property),
    PropertyReplacement { old: Address, new: Property },
    MonitoredItem(MonitoredItem),
    InventoryItem(InventoryItem),
    /// Failure description for `Failed` outcomes.
    Error(String),
}

impl From<Property> for Payload {
    fn from(value: Property) -> Self {
        Self::Property(value)
    }
}

impl From<MonitoredItem> for Payload {
    fn from(value: MonitoredItem) -> Self {
        Self::MonitoredItem(value)
    }
}

impl From<InventoryItem> for Payload {
    fn from(value: InventoryItem) -> Self {
        Self::InventoryItem(value)
    }
}

/// Notification envelope.
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    /// Publishing component (`property_monitor`, `sqlite_store`, ...).
    pub source: &'static str,
    pub payload: Option<Payload>,
    /// Set on registry mutations and on the storage cycle they trigger.
    pub change_id: Option<ChangeId>,
}

impl Notification {
    pub fn new(kind: NotificationKind, source: &'static str) -> Self {
        Self {
            kind,
            source,
            payload: None,
            change_id: None,
        }
    }

    pub fn with_payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_change_id(mut self, change_id: Option<ChangeId>) -> Self {
        self.change_id = change_id;
        self
    }

    /// Error message for failure payloads.
    pub fn error_message(&self) -> Option<&str> {
        match &self.payload {
            Some(Payload::Error(message)) => Some(message.as_str()),
            _ => None,
        }
    }
}
