//! Status command for showing where data lives and how each event stands.

use std::io::Write;

use anyhow::Result;
use attend_core::EventStats;

use super::util::open_database;
use crate::Config;

pub fn run<W: Write>(writer: &mut W, config: &Config) -> Result<()> {
    let db = open_database(config)?;
    let events = db.list_events()?;

    writeln!(writer, "Attendance tracker status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(
        writer,
        "Participants: {}",
        db.list_participants(None)?.len()
    )?;

    if events.is_empty() {
        writeln!(writer, "No events.")?;
        return Ok(());
    }

    writeln!(writer, "Events:")?;
    for event in &events {
        let stats = EventStats::tally(event, &db.event_sessions(event.id)?);
        let state = if stats.active { "active" } else { "finalized" };
        writeln!(
            writer,
            "- #{} {} ({}) [{state}]: {} present, {} absent, {} pending",
            event.id, event.title, event.event_date, stats.present, stats.absent, stats.pending
        )?;
    }

    Ok(())
}
