//! SQLite snapshot store with a write-behind worker thread.
//!
//! # Responsibility
//! - Accept registry snapshots without blocking the caller.
//! - Replace stored state with each snapshot in one immediate transaction.
//! - Report storage lifecycle on the notification bus.
//!
//! # Invariants
//! - Snapshots are written in the order they were queued.
//! - Dropping the store drains queued snapshots and joins the worker.

use crate::db::{open_db, open_db_in_memory};
use crate::model::period::Period;
use crate::model::property::Property;
use crate::notify::{
    ChangeId, Notification, NotificationBus, NotificationKind, Payload, StorageOperation,
    StoreState,
};
use crate::store::record::{
    non_empty, InventoryItemRecord, MonitoredItemRecord, PropertyRecord,
};
use crate::store::{Snapshot, SnapshotStore, StoreError, StoreResult};
use chrono::NaiveDate;
use log::{error, info, warn};
use rusqlite::{params, Connection, Row, TransactionBehavior};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

const SOURCE: &str = "sqlite_store";
const WORKER_THREAD_NAME: &str = "propwatch-store-writer";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Write-behind store persisting full snapshots into SQLite.
pub struct SqliteSnapshotStore {
    conn: Arc<Mutex<Connection>>,
    bus: Arc<NotificationBus>,
    jobs: Mutex<Option<Sender<Snapshot>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SqliteSnapshotStore {
    /// Opens (creating if needed) the store at `path`.
    pub fn open(path: impl AsRef<Path>, bus: Arc<NotificationBus>) -> StoreResult<Self> {
        Self::start(open_db(path)?, bus)
    }

    /// Opens a store backed by an in-memory database.
    pub fn open_in_memory(bus: Arc<NotificationBus>) -> StoreResult<Self> {
        Self::start(open_db_in_memory()?, bus)
    }

    fn start(conn: Connection, bus: Arc<NotificationBus>) -> StoreResult<Self> {
        let conn = Arc::new(Mutex::new(conn));
        let (tx, rx) = mpsc::channel::<Snapshot>();
        let worker_conn = Arc::clone(&conn);
        let worker_bus = Arc::clone(&bus);
        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_writer(worker_conn, worker_bus, rx))?;

        Ok(Self {
            conn,
            bus,
            jobs: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Stops accepting snapshots, waits for queued writes, joins the worker.
    ///
    /// Later `persist` calls report `Failed` immediately.
    pub fn shutdown(&self) {
        let sender = self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("event=store_shutdown module=store status=error error=worker_panicked");
            }
        }
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn persist(&self, snapshot: Snapshot) {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let rejected = match jobs.as_ref() {
            Some(tx) => tx.send(snapshot).err().map(|err| err.0),
            None => Some(snapshot),
        };
        drop(jobs);

        if let Some(snapshot) = rejected {
            warn!("event=store_persist module=store status=error error=worker_unavailable");
            let change_id = snapshot.change_id;
            publish(&self.bus, StorageOperation::Store, StoreState::Started, change_id, None);
            publish(
                &self.bus,
                StorageOperation::Store,
                StoreState::Failed,
                change_id,
                Some(StoreError::WorkerUnavailable.to_string()),
            );
        }
    }

    fn load(&self) -> StoreResult<Vec<Property>> {
        let started_at = Instant::now();
        publish(&self.bus, StorageOperation::Load, StoreState::Started, None, None);

        let result = {
            let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
            read_snapshot(&conn)
        };

        match &result {
            Ok(properties) => {
                info!(
                    "event=store_load module=store status=ok properties={} duration_ms={}",
                    properties.len(),
                    started_at.elapsed().as_millis()
                );
                publish(&self.bus, StorageOperation::Load, StoreState::Complete, None, None);
            }
            Err(err) => {
                error!(
                    "event=store_load module=store status=error duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                publish(
                    &self.bus,
                    StorageOperation::Load,
                    StoreState::Failed,
                    None,
                    Some(err.to_string()),
                );
            }
        }
        result
    }
}

impl Drop for SqliteSnapshotStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_writer(conn: Arc<Mutex<Connection>>, bus: Arc<NotificationBus>, jobs: Receiver<Snapshot>) {
    for snapshot in jobs {
        let started_at = Instant::now();
        publish(&bus, StorageOperation::Store, StoreState::Started, snapshot.change_id, None);

        let result = {
            let mut conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            write_snapshot(&mut conn, &snapshot.properties)
        };

        match result {
            Ok(()) => {
                info!(
                    "event=store_persist module=store status=ok properties={} duration_ms={}",
                    snapshot.properties.len(),
                    started_at.elapsed().as_millis()
                );
                publish(
                    &bus,
                    StorageOperation::Store,
                    StoreState::Complete,
                    snapshot.change_id,
                    None,
                );
            }
            Err(err) => {
                error!(
                    "event=store_persist module=store status=error duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                publish(
                    &bus,
                    StorageOperation::Store,
                    StoreState::Failed,
                    snapshot.change_id,
                    Some(err.to_string()),
                );
            }
        }
    }
}

fn publish(
    bus: &NotificationBus,
    operation: StorageOperation,
    state: StoreState,
    change_id: Option<ChangeId>,
    failure: Option<String>,
) {
    let mut notification = Notification::new(NotificationKind::Storage(operation, state), SOURCE)
        .with_change_id(change_id);
    if let Some(message) = failure {
        notification = notification.with_payload(Payload::Error(message));
    }
    bus.publish(notification);
}

fn write_snapshot(conn: &mut Connection, properties: &[Property]) -> StoreResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    // Item rows go with their property through ON DELETE CASCADE.
    tx.execute("DELETE FROM properties;", [])?;

    for (position, property) in properties.iter().enumerate() {
        let record = PropertyRecord::from(property);
        tx.execute(
            "INSERT INTO properties (position, postcode, address_lines) VALUES (?1, ?2, ?3);",
            params![
                position as i64,
                record.postcode.as_str(),
                serde_json::to_string(&record.address)?,
            ],
        )?;
        let property_id = tx.last_insert_rowid();

        for (item_position, item) in record.monitored_items.iter().enumerate() {
            tx.execute(
                "INSERT INTO monitored_items (
                    property_id,
                    position,
                    description,
                    period_for_next_action,
                    notice_every,
                    last_actioned,
                    advance_notice,
                    period_for_next_notice,
                    email_sent_on
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
                params![
                    property_id,
                    item_position as i64,
                    item.description.as_str(),
                    item.period_for_next_action.as_str(),
                    item.notice_every,
                    format_date(item.last_actioned),
                    item.advance_notice,
                    item.period_for_next_notice.as_str(),
                    item.email_sent_on.map(format_date),
                ],
            )?;
        }

        for (item_position, item) in record.inventory_items.iter().enumerate() {
            tx.execute(
                "INSERT INTO inventory_items (
                    property_id,
                    position,
                    description,
                    manufacturer,
                    model,
                    serial_number,
                    supplier,
                    purchase_date
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
                params![
                    property_id,
                    item_position as i64,
                    item.description.as_str(),
                    item.manufacturer.as_deref(),
                    item.model.as_deref(),
                    item.serial_number.as_deref(),
                    item.supplier.as_deref(),
                    item.purchase_date.map(format_date),
                ],
            )?;
        }
    }

    tx.commit()?;
    Ok(())
}

fn read_snapshot(conn: &Connection) -> StoreResult<Vec<Property>> {
    let mut stmt = conn.prepare(
        "SELECT id, postcode, address_lines FROM properties ORDER BY position ASC, id ASC;",
    )?;
    let mut rows = stmt.query([])?;
    let mut headers = Vec::new();
    while let Some(row) = rows.next()? {
        let id: i64 = row.get("id")?;
        let postcode: String = row.get("postcode")?;
        let lines_json: String = row.get("address_lines")?;
        let address = serde_json::from_str::<Vec<String>>(&lines_json).map_err(|_| {
            StoreError::InvalidData(format!(
                "invalid address lines `{lines_json}` in properties.address_lines"
            ))
        })?;
        headers.push((id, postcode, address));
    }

    let mut properties = Vec::with_capacity(headers.len());
    for (id, postcode, address) in headers {
        let record = PropertyRecord {
            address,
            postcode,
            monitored_items: read_monitored_items(conn, id)?,
            inventory_items: read_inventory_items(conn, id)?,
        };
        properties.push(record.into_property()?);
    }
    Ok(properties)
}

fn read_monitored_items(
    conn: &Connection,
    property_id: i64,
) -> StoreResult<Vec<MonitoredItemRecord>> {
    let mut stmt = conn.prepare(
        "SELECT
            description,
            period_for_next_action,
            notice_every,
            last_actioned,
            advance_notice,
            period_for_next_notice,
            email_sent_on
         FROM monitored_items
         WHERE property_id = ?1
         ORDER BY position ASC, id ASC;",
    )?;
    let mut rows = stmt.query([property_id])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_monitored_row(row)?);
    }
    Ok(items)
}

fn read_inventory_items(
    conn: &Connection,
    property_id: i64,
) -> StoreResult<Vec<InventoryItemRecord>> {
    let mut stmt = conn.prepare(
        "SELECT
            description,
            manufacturer,
            model,
            serial_number,
            supplier,
            purchase_date
         FROM inventory_items
         WHERE property_id = ?1
         ORDER BY position ASC, id ASC;",
    )?;
    let mut rows = stmt.query([property_id])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        let purchase_date = match row.get::<_, Option<String>>("purchase_date")? {
            Some(value) => Some(parse_date(&value, "inventory_items.purchase_date")?),
            None => None,
        };
        items.push(InventoryItemRecord {
            description: row.get("description")?,
            manufacturer: optional_text(row, "manufacturer")?,
            model: optional_text(row, "model")?,
            serial_number: optional_text(row, "serial_number")?,
            supplier: optional_text(row, "supplier")?,
            purchase_date,
        });
    }
    Ok(items)
}

fn parse_monitored_row(row: &Row<'_>) -> StoreResult<MonitoredItemRecord> {
    let last_actioned: String = row.get("last_actioned")?;
    let email_sent_on = match row.get::<_, Option<String>>("email_sent_on")? {
        Some(value) => Some(parse_date(&value, "monitored_items.email_sent_on")?),
        None => None,
    };

    Ok(MonitoredItemRecord {
        description: row.get("description")?,
        period_for_next_action: parse_period(row, "period_for_next_action")?,
        notice_every: row.get("notice_every")?,
        last_actioned: parse_date(&last_actioned, "monitored_items.last_actioned")?,
        advance_notice: row.get("advance_notice")?,
        period_for_next_notice: parse_period(row, "period_for_next_notice")?,
        email_sent_on,
    })
}

fn parse_period(row: &Row<'_>, column: &str) -> StoreResult<Period> {
    let value: String = row.get(column)?;
    value.parse::<Period>().map_err(|_| {
        StoreError::InvalidData(format!("invalid period `{value}` in monitored_items.{column}"))
    })
}

fn parse_date(value: &str, column: &str) -> StoreResult<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| StoreError::InvalidData(format!("invalid date `{value}` in {column}")))
}

fn optional_text(row: &Row<'_>, column: &str) -> StoreResult<Option<String>> {
    Ok(row
        .get::<_, Option<String>>(column)?
        .as_deref()
        .and_then(non_empty))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
