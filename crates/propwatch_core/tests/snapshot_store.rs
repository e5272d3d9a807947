use chrono::NaiveDate;
use propwatch_core::store::record::{decode_snapshot, encode_snapshot};
use propwatch_core::{
    Address, ChangeId, EntityEvent, InventoryItem, MonitorError, MonitoredItem, NoopAuditSink,
    Notification, NotificationBus, NotificationKind, Period, Property, PropertyMonitor, Snapshot,
    SnapshotStore, SqliteSnapshotStore, StorageOperation, StoreError, StoreState,
};
use rusqlite::Connection;
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn address() -> Address {
    Address::parse("CW3 9ST", ["99 The Street", "The Town"]).unwrap()
}

fn boiler() -> MonitoredItem {
    MonitoredItem::new(
        "boiler service",
        Period::Yearly,
        1,
        date(2021, 11, 5),
        1,
        Period::Weekly,
    )
    .unwrap()
    .with_owner(address())
}

fn store_complete(change_id: Option<ChangeId>) -> impl Fn(&Notification) -> bool {
    move |notification| {
        notification.kind
            == NotificationKind::Storage(StorageOperation::Store, StoreState::Complete)
            && notification.change_id == change_id
    }
}

/// Receives until `done` matches, returning everything seen including the match.
fn collect_until(
    rx: &Receiver<Notification>,
    done: impl Fn(&Notification) -> bool,
) -> Vec<Notification> {
    let mut seen = Vec::new();
    loop {
        let notification = rx
            .recv_timeout(WAIT)
            .expect("storage notification should arrive");
        let finished = done(&notification);
        seen.push(notification);
        if finished {
            return seen;
        }
    }
}

fn open(path: &Path) -> (PropertyMonitor, Arc<SqliteSnapshotStore>, Receiver<Notification>) {
    let bus = Arc::new(NotificationBus::new());
    let (_id, rx) = bus.subscribe();
    let store = Arc::new(SqliteSnapshotStore::open(path, Arc::clone(&bus)).unwrap());
    let monitor = PropertyMonitor::open(bus, store.clone(), Arc::new(NoopAuditSink)).unwrap();
    (monitor, store, rx)
}

#[test]
fn entity_notification_precedes_storage_completion() {
    let dir = tempfile::tempdir().unwrap();
    let (monitor, _store, rx) = open(&dir.path().join("property.sqlite3"));
    let _ = collect_until(&rx, |n| {
        n.kind == NotificationKind::Storage(StorageOperation::Load, StoreState::Complete)
    });

    monitor.add_property(Property::new(address())).unwrap();

    let first = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(first.kind, NotificationKind::Property(EntityEvent::Add));
    assert!(first.change_id.is_some());

    let rest = collect_until(&rx, store_complete(first.change_id));
    assert_eq!(
        rest[0].kind,
        NotificationKind::Storage(StorageOperation::Store, StoreState::Started)
    );
    assert_eq!(rest[0].change_id, first.change_id);
    assert_eq!(rest[0].source, "sqlite_store");
    assert_eq!(rest.len(), 2);
}

#[test]
fn persisted_registry_reloads_with_identical_schedule() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model").join("property.sqlite3");

    let boiler = boiler().with_email_sent_on(Some(date(2022, 10, 29)));
    let gutters = MonitoredItem::new(
        "clear gutters",
        Period::Monthly,
        6,
        date(2021, 3, 31),
        2,
        Period::Weekly,
    )
    .unwrap()
    .with_owner(address());
    let fridge = InventoryItem::new(
        "fridge",
        "Bosch",
        "KGN36",
        "",
        "Currys",
        Some(date(2020, 6, 1)),
    )
    .unwrap()
    .with_owner(address());

    {
        let (monitor, _store, _rx) = open(&path);
        monitor.add_property(Property::new(address())).unwrap();
        monitor.add_item(boiler.clone()).unwrap();
        monitor.add_item(gutters.clone()).unwrap();
        monitor.add_item(fridge.clone()).unwrap();
        // Dropping the registry and store drains the writer.
    }

    let (reloaded, _store, _rx) = open(&path);
    assert_eq!(reloaded.properties(), vec![Property::new(address())]);

    let items = reloaded.monitored_items_for(&address()).unwrap();
    assert_eq!(items.len(), 2);
    for original in [&boiler, &gutters] {
        let loaded = items.iter().find(|item| *item == original).unwrap();
        assert_eq!(loaded.time_for_next_action(), original.time_for_next_action());
        assert_eq!(loaded.time_for_next_notice(), original.time_for_next_notice());
        assert_eq!(loaded.email_sent_on(), original.email_sent_on());
        assert_eq!(loaded.owner(), Some(&address()));
    }

    let inventory = reloaded.inventory_items_for(&address()).unwrap();
    assert_eq!(inventory, vec![fridge]);
    assert_eq!(inventory[0].serial_number(), "");
    assert_eq!(inventory[0].supplier(), "Currys");
    assert_eq!(inventory[0].purchase_date(), Some(date(2020, 6, 1)));
}

#[test]
fn write_failure_is_reported_only_on_the_bus() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("property.sqlite3");
    let (monitor, _store, rx) = open(&path);

    monitor.add_property(Property::new(address())).unwrap();
    let added = rx
        .iter()
        .find(|n| n.kind == NotificationKind::Property(EntityEvent::Add))
        .unwrap();
    let _ = collect_until(&rx, store_complete(added.change_id));

    let saboteur = Connection::open(&path).unwrap();
    saboteur
        .execute_batch(
            "DROP TABLE monitored_items; DROP TABLE inventory_items; DROP TABLE properties;",
        )
        .unwrap();
    drop(saboteur);

    let removed = monitor.remove_property(&address());
    assert!(removed.is_ok());

    let seen = collect_until(&rx, |n| {
        n.kind == NotificationKind::Storage(StorageOperation::Store, StoreState::Failed)
    });
    let failed = seen.last().unwrap();
    assert!(failed.error_message().is_some());
    assert!(seen
        .iter()
        .any(|n| n.kind == NotificationKind::Property(EntityEvent::Removed)));
}

#[test]
fn persist_after_shutdown_fails_immediately() {
    let bus = Arc::new(NotificationBus::new());
    let store = SqliteSnapshotStore::open_in_memory(Arc::clone(&bus)).unwrap();
    store.shutdown();

    let (_id, rx) = bus.subscribe();
    store.persist(Snapshot {
        change_id: None,
        properties: Vec::new(),
    });

    let kinds = rx.try_iter().map(|n| n.kind).collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::Storage(StorageOperation::Store, StoreState::Started),
            NotificationKind::Storage(StorageOperation::Store, StoreState::Failed),
        ]
    );
}

#[test]
fn load_rejects_malformed_rows_as_a_whole() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("property.sqlite3");
    {
        let (monitor, _store, _rx) = open(&path);
        monitor.add_property(Property::new(address())).unwrap();
        monitor.add_item(boiler()).unwrap();
    }

    let conn = Connection::open(&path).unwrap();
    conn.execute("UPDATE monitored_items SET last_actioned = 'not a date';", [])
        .unwrap();
    drop(conn);

    let bus = Arc::new(NotificationBus::new());
    let (_id, rx) = bus.subscribe();
    let store = SqliteSnapshotStore::open(&path, Arc::clone(&bus)).unwrap();
    let err = store.load().unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(_)), "unexpected error: {err}");

    let kinds = rx.try_iter().map(|n| n.kind).collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::Storage(StorageOperation::Load, StoreState::Started),
            NotificationKind::Storage(StorageOperation::Load, StoreState::Failed),
        ]
    );
}

#[test]
fn json_export_omits_derived_dates_and_round_trips() {
    let mut property = Property::new(address());
    let bus = Arc::new(NotificationBus::new());
    let store = Arc::new(SqliteSnapshotStore::open_in_memory(Arc::clone(&bus)).unwrap());
    let monitor = PropertyMonitor::new(bus, store, Arc::new(NoopAuditSink));
    monitor.add_property(property.clone()).unwrap();
    monitor.add_item(boiler()).unwrap();
    property = monitor.properties().remove(0);

    let bytes = encode_snapshot(std::slice::from_ref(&property)).unwrap();
    let text = String::from_utf8(bytes.clone()).unwrap();
    assert!(text.contains("\"last_actioned\": \"2021-11-05\""));
    assert!(!text.contains("time_for_next_action"));
    assert!(!text.contains("email_sent_on"));

    let decoded = decode_snapshot(&bytes).unwrap();
    assert_eq!(decoded, vec![property.clone()]);
    assert_eq!(
        decoded[0].monitored_items()[0].time_for_next_notice(),
        property.monitored_items()[0].time_for_next_notice()
    );
}

#[test]
fn exported_registry_imports_back_after_clear() {
    let bus = Arc::new(NotificationBus::new());
    let store = Arc::new(SqliteSnapshotStore::open_in_memory(Arc::clone(&bus)).unwrap());
    let monitor = PropertyMonitor::new(Arc::clone(&bus), store, Arc::new(NoopAuditSink));
    monitor.add_property(Property::new(address())).unwrap();
    monitor.add_item(boiler()).unwrap();
    let exported = encode_snapshot(&monitor.properties()).unwrap();
    let before = monitor.all_monitored_items();

    monitor.clear();
    assert!(monitor.properties().is_empty());

    let (_id, rx) = bus.subscribe();
    let imported = monitor.import(decode_snapshot(&exported).unwrap()).unwrap();
    assert_eq!(imported, 1);

    let after = monitor.all_monitored_items();
    assert_eq!(after, before);
    assert_eq!(after[0].time_for_next_action(), date(2022, 11, 5));
    assert_eq!(after[0].time_for_next_action(), before[0].time_for_next_action());
    assert_eq!(after[0].time_for_next_notice(), before[0].time_for_next_notice());
    assert_eq!(after[0].owner(), Some(&address()));

    let added = rx
        .try_iter()
        .filter(|n| n.kind == NotificationKind::Property(EntityEvent::Add))
        .count();
    assert_eq!(added, 1);
}

#[test]
fn importing_a_registered_address_is_mirrored_as_failed() {
    let bus = Arc::new(NotificationBus::new());
    let store = Arc::new(SqliteSnapshotStore::open_in_memory(Arc::clone(&bus)).unwrap());
    let monitor = PropertyMonitor::new(Arc::clone(&bus), store, Arc::new(NoopAuditSink));
    monitor.add_property(Property::new(address())).unwrap();
    let exported = encode_snapshot(&monitor.properties()).unwrap();

    let (_id, rx) = bus.subscribe();
    let err = monitor
        .import(decode_snapshot(&exported).unwrap())
        .unwrap_err();
    assert!(matches!(err, MonitorError::Duplicate { .. }), "unexpected error: {err}");

    let failed = rx
        .try_iter()
        .filter(|n| n.kind == NotificationKind::Property(EntityEvent::Failed))
        .count();
    assert_eq!(failed, 1);
    assert_eq!(monitor.properties().len(), 1);
}
