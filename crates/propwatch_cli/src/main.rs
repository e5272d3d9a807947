//! Command-line entry point for propwatch.
//!
//! # Responsibility
//! - Verify `propwatch_core` linkage (`ping`, `version`).
//! - Print schedule reports from the configured store.
//! - Move the registry in and out of the JSON snapshot format.

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use log::error;
use propwatch_core::store::record::{decode_snapshot, encode_snapshot};
use propwatch_core::{
    init_logging, LogAuditSink, MonitorConfig, MonitoredItem, NotificationBus, PropertyMonitor,
    PropertySelect, SqliteSnapshotStore,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "propwatch", version, about = "Property maintenance monitor")]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Check that the core library is linked
    Ping,
    /// Print the core library version
    Version,
    /// Print overdue items and notices as of a date
    Report {
        /// Report date (YYYY-MM-DD); defaults to today
        #[arg(value_name = "YYYY-MM-DD", value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Write the registry as a JSON snapshot to stdout
    Export,
    /// Register every property of a JSON snapshot file
    Import {
        /// Snapshot produced by `export`
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

impl Cmd {
    fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Version => "version",
            Self::Report { .. } => "report",
            Self::Export => "export",
            Self::Import { .. } => "import",
        }
    }
}

fn main() -> ExitCode {
    let cmd = Cli::parse().cmd.unwrap_or(Cmd::Ping);

    let result = match &cmd {
        Cmd::Ping => {
            println!("propwatch_core ping={}", propwatch_core::ping());
            Ok(())
        }
        Cmd::Version => {
            println!("propwatch_core version={}", propwatch_core::core_version());
            Ok(())
        }
        Cmd::Report { date } => report(date.unwrap_or_else(|| Local::now().date_naive())),
        Cmd::Export => export(),
        Cmd::Import { file } => import(file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!(
                "event=cli_command module=cli status=error command={}",
                cmd.name()
            );
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|err| format!("expected YYYY-MM-DD: {err}"))
}

fn open_monitor() -> Result<PropertyMonitor, String> {
    let config = MonitorConfig::from_env().map_err(|err| err.to_string())?;
    config.ensure_dirs().map_err(|err| err.to_string())?;
    init_logging(config.log_level(), &config.log_dir()).map_err(|err| err.to_string())?;

    let bus = Arc::new(NotificationBus::new());
    let store = Arc::new(
        SqliteSnapshotStore::open(config.store_path(), Arc::clone(&bus))
            .map_err(|err| format!("store open failed: {err}"))?,
    );
    PropertyMonitor::open(bus, store, Arc::new(LogAuditSink))
        .map_err(|err| format!("store load failed: {err}"))
}

fn report(date: NaiveDate) -> Result<(), String> {
    let monitor = open_monitor()?;
    let select = PropertySelect::new(&monitor);

    println!("Report for {date}");
    println!("Properties with overdue items:");
    for property in select.with_overdue_items_as_of(date) {
        println!("  {property}");
    }
    println!("Properties with notices due:");
    for property in select.with_overdue_notices_as_of(date) {
        println!("  {property}");
    }
    println!("Actions due on {date}:");
    for item in select.overdue_items_for(date) {
        print_item_line(&item);
    }
    println!("Notices due on {date}:");
    for item in select.notified_items_for(date) {
        print_item_line(&item);
    }
    Ok(())
}

fn print_item_line(item: &MonitoredItem) {
    let owner = item
        .owner()
        .map(ToString::to_string)
        .unwrap_or_default();
    println!(
        "  {item} (next action {}, notice {}) at {owner}",
        item.time_for_next_action(),
        item.time_for_next_notice()
    );
}

fn export() -> Result<(), String> {
    let monitor = open_monitor()?;
    let bytes = encode_snapshot(&monitor.properties()).map_err(|err| err.to_string())?;
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&bytes)
        .and_then(|()| stdout.write_all(b"\n"))
        .map_err(|err| format!("export write failed: {err}"))
}

fn import(file: &Path) -> Result<(), String> {
    let bytes = std::fs::read(file)
        .map_err(|err| format!("failed to read `{}`: {err}", file.display()))?;
    let properties = decode_snapshot(&bytes)
        .map_err(|err| format!("invalid snapshot `{}`: {err}", file.display()))?;

    let monitor = open_monitor()?;
    let imported = monitor
        .import(properties)
        .map_err(|err| format!("import failed: {err}"))?;
    println!("imported {imported} properties from {}", file.display());
    Ok(())
}
