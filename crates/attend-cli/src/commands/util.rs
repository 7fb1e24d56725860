//! Shared utilities for CLI commands.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use attend_core::{AttendanceEngine, EventId, SystemClock};
use attend_db::{Database, SqliteStore};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::Config;

/// Opens the configured database, creating its directory if needed.
pub fn open_database(config: &Config) -> Result<Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))
}

/// Builds an engine over the configured database using the system clock.
pub fn open_engine(config: &Config) -> Result<AttendanceEngine<SqliteStore>> {
    let store = SqliteStore::new(open_database(config)?);
    Ok(AttendanceEngine::with_clock(
        store,
        Arc::new(SystemClock),
        config.policy(),
    ))
}

pub fn event_id(raw: i64) -> Result<EventId> {
    EventId::new(raw).context("invalid event ID")
}

/// Parses an RFC 3339 timestamp such as `2025-03-01T09:00:00Z`.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(s.trim()) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(_) => bail!("Invalid datetime: {s}. Use RFC 3339 (e.g., 2025-03-01T09:00:00Z)"),
    }
}

/// Formats a timestamp for tables, to the second.
pub fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn format_minutes(minutes: Option<f64>) -> String {
    minutes.map_or_else(|| "-".to_string(), |m| format!("{m:.2}"))
}
