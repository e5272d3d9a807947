use chrono::NaiveDate;
use propwatch_core::{
    Address, MonitoredItem, NoopAuditSink, NotificationBus, Period, Property, PropertyMonitor,
    PropertySelect, SqliteSnapshotStore,
};
use std::sync::Arc;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn address1() -> Address {
    Address::parse("CW3 9ST", ["99 The Street", "The Town"]).unwrap()
}

fn address2() -> Address {
    Address::parse("CW3 9SU", ["100 The Street", "The Town"]).unwrap()
}

/// Boiler at address1 due 2022-11-05 (notice 2022-10-29); alarm at address2
/// due 2022-03-08 (notice 2022-03-01).
fn populated() -> PropertyMonitor {
    let bus = Arc::new(NotificationBus::new());
    let store = Arc::new(SqliteSnapshotStore::open_in_memory(Arc::clone(&bus)).unwrap());
    let monitor = PropertyMonitor::new(bus, store, Arc::new(NoopAuditSink));
    monitor.add_property(Property::new(address1())).unwrap();
    monitor.add_property(Property::new(address2())).unwrap();

    let boiler = MonitoredItem::new(
        "boiler service",
        Period::Yearly,
        1,
        date(2021, 11, 5),
        1,
        Period::Weekly,
    )
    .unwrap()
    .with_owner(address1());
    let alarm = MonitoredItem::new(
        "smoke alarm",
        Period::Weekly,
        1,
        date(2022, 3, 1),
        1,
        Period::Weekly,
    )
    .unwrap()
    .with_owner(address2());
    monitor.add_item(boiler).unwrap();
    monitor.add_item(alarm).unwrap();
    monitor
}

#[test]
fn overdue_items_for_matches_exact_date_only() {
    let monitor = populated();
    let select = PropertySelect::new(&monitor);
    let due = date(2022, 11, 5);

    let hits = select.overdue_items_for(due);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].description(), "boiler service");
    assert_eq!(hits[0].owner(), Some(&address1()));

    assert!(select.overdue_items_for(due.pred_opt().unwrap()).is_empty());
    assert!(select.overdue_items_for(due.succ_opt().unwrap()).is_empty());
}

#[test]
fn notified_items_for_matches_exact_notice_date() {
    let monitor = populated();
    let select = PropertySelect::new(&monitor);

    let hits = select.notified_items_for(date(2022, 3, 1));
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].description(), "smoke alarm");
    assert_eq!(hits[0].owner(), Some(&address2()));

    assert!(select.notified_items_for(date(2022, 2, 28)).is_empty());
    assert!(select.notified_items_for(date(2022, 3, 2)).is_empty());
}

#[test]
fn with_overdue_items_uses_strict_after_boundary() {
    let monitor = populated();
    let select = PropertySelect::new(&monitor);

    assert!(select.with_overdue_items_as_of(date(2022, 3, 8)).is_empty());

    let overdue = select.with_overdue_items_as_of(date(2022, 3, 9));
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].address(), &address2());

    let both = select.with_overdue_items_as_of(date(2022, 11, 6));
    assert_eq!(both.len(), 2);
}

#[test]
fn with_overdue_notices_reports_properties_past_notice() {
    let monitor = populated();
    let select = PropertySelect::new(&monitor);

    let noticed = select.with_overdue_notices_as_of(date(2022, 10, 30));
    let addresses = noticed
        .iter()
        .map(|property| property.address().clone())
        .collect::<Vec<_>>();
    assert_eq!(addresses.len(), 2);
    assert!(addresses.contains(&address1()));

    assert_eq!(select.with_overdue_notices_as_of(date(2022, 3, 2)).len(), 1);
}

#[test]
fn today_queries_see_long_overdue_items() {
    let monitor = populated();
    let select = PropertySelect::new(&monitor);

    assert_eq!(select.with_overdue_items().len(), 2);
    assert_eq!(select.with_overdue_notices().len(), 2);
}

#[test]
fn per_property_queries_delegate_to_registry() {
    let monitor = populated();
    let select = PropertySelect::new(&monitor);

    assert_eq!(select.monitored_items_for(&address2()).unwrap().len(), 1);
    assert!(select.inventory_items_for(&address1()).unwrap().is_empty());
    let unknown = Address::parse("CW3 9SZ", ["1 Nowhere"]).unwrap();
    assert!(select.monitored_items_for(&unknown).is_err());
}
