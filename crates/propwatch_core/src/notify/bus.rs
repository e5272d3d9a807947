//! Copy-on-write publish/subscribe bus.
//!
//! # Invariants
//! - `publish` never holds the registration lock while calling listeners, so
//!   listeners may register or deregister during fan-out.
//! - A listener sees a notification iff it was registered when `publish`
//!   took its snapshot.

use super::Notification;
use log::debug;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};

/// Receives every published notification regardless of category.
///
/// Called on the publisher's thread; implementations must not block and must
/// not call back into the publishing registry.
pub trait NotificationListener: Send + Sync {
    fn notify(&self, notification: &Notification);
}

impl<F> NotificationListener for F
where
    F: Fn(&Notification) + Send + Sync,
{
    fn notify(&self, notification: &Notification) {
        self(notification)
    }
}

/// Handle returned by registration, used to deregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl Display for ListenerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

type ListenerList = Vec<(ListenerId, Arc<dyn NotificationListener>)>;

/// In-process notification bus.
#[derive(Default)]
pub struct NotificationBus {
    listeners: Mutex<Arc<ListenerList>>,
    next_id: AtomicU64,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener and returns its handle.
    pub fn register(&self, listener: Arc<dyn NotificationListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut guard = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = ListenerList::clone(&guard);
        next.push((id, listener));
        *guard = Arc::new(next);
        debug!("event=listener_register module=notify status=ok id={id}");
        id
    }

    /// Registers a closure listener.
    pub fn register_fn<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.register(Arc::new(listener))
    }

    /// Removes a listener. Returns false when the handle is unknown.
    pub fn deregister(&self, id: ListenerId) -> bool {
        let mut guard = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        if !guard.iter().any(|(existing, _)| *existing == id) {
            return false;
        }
        let next = guard
            .iter()
            .filter(|(existing, _)| *existing != id)
            .cloned()
            .collect::<ListenerList>();
        *guard = Arc::new(next);
        debug!("event=listener_deregister module=notify status=ok id={id}");
        true
    }

    /// Registers a channel-backed listener and returns its receiving end.
    ///
    /// The listener stays registered until `deregister` is called; sends to a
    /// dropped receiver are ignored.
    pub fn subscribe(&self) -> (ListenerId, Receiver<Notification>) {
        let (tx, rx) = mpsc::channel();
        let id = self.register(Arc::new(ChannelListener { tx }));
        (id, rx)
    }

    /// Delivers `notification` to every currently registered listener.
    pub fn publish(&self, notification: Notification) {
        let snapshot = {
            let guard = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(&guard)
        };
        debug!(
            "event=notification_publish module=notify kind={} source={} listeners={}",
            notification.kind,
            notification.source,
            snapshot.len()
        );
        for (_, listener) in snapshot.iter() {
            listener.notify(&notification);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

struct ChannelListener {
    tx: Sender<Notification>,
}

impl NotificationListener for ChannelListener {
    fn notify(&self, notification: &Notification) {
        let _ = self.tx.send(notification.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::NotificationBus;
    use crate::notify::{EntityEvent, Notification, NotificationKind};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn property_added() -> Notification {
        Notification::new(NotificationKind::Property(EntityEvent::Add), "test")
    }

    #[test]
    fn deregistered_listener_stops_receiving() {
        let bus = NotificationBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = bus.register_fn(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(property_added());
        assert!(bus.deregister(id));
        assert!(!bus.deregister(id));
        bus.publish(property_added());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn listener_may_register_during_fan_out() {
        let bus = Arc::new(NotificationBus::new());
        let inner = Arc::clone(&bus);
        bus.register_fn(move |_| {
            inner.register_fn(|_| {});
        });

        bus.publish(property_added());
        assert_eq!(bus.listener_count(), 2);
    }

    #[test]
    fn subscribe_delivers_clones_in_order() {
        let bus = NotificationBus::new();
        let (_id, rx) = bus.subscribe();
        bus.publish(property_added());
        bus.publish(Notification::new(
            NotificationKind::Property(EntityEvent::Removed),
            "test",
        ));

        let kinds = rx.try_iter().map(|n| n.kind).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                NotificationKind::Property(EntityEvent::Add),
                NotificationKind::Property(EntityEvent::Removed)
            ]
        );
    }
}
