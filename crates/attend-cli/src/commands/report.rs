//! Per-event reporting: finalize, stats and roster.

use std::io::Write;

use anyhow::{Result, bail};
use attend_core::RosterEntry;
use clap::Args;

use super::util::{event_id, format_minutes, format_time, open_database, open_engine};
use crate::Config;

#[derive(Debug, Args)]
pub struct EventArgs {
    /// Event ID.
    pub event_id: i64,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn finalize<W: Write>(writer: &mut W, args: &EventArgs, config: &Config) -> Result<()> {
    let engine = open_engine(config)?;
    let summary = engine.finalize_event(event_id(args.event_id)?)?;
    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&summary)?)?;
    } else {
        writeln!(
            writer,
            "Finalized event {}: {} pending session(s) marked ABSENT",
            summary.event_id, summary.finalized_count
        )?;
    }
    Ok(())
}

pub fn stats<W: Write>(writer: &mut W, args: &EventArgs, config: &Config) -> Result<()> {
    let engine = open_engine(config)?;
    let stats = engine.event_stats(event_id(args.event_id)?)?;
    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&stats)?)?;
        return Ok(());
    }

    let state = if stats.active { "active" } else { "finalized" };
    writeln!(writer, "{} (event {}, {state})", stats.title, stats.event_id)?;
    writeln!(writer, "Total scans: {}", stats.total_scans)?;
    writeln!(writer, "Present: {}", stats.present)?;
    writeln!(writer, "Absent: {}", stats.absent)?;
    writeln!(writer, "Pending: {}", stats.pending)?;
    Ok(())
}

pub fn roster<W: Write>(writer: &mut W, args: &EventArgs, config: &Config) -> Result<()> {
    let id = event_id(args.event_id)?;
    let db = open_database(config)?;
    if db.event(id)?.is_none() {
        bail!("event not found: {id}");
    }
    let entries = db.roster(id)?;

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&entries)?)?;
        return Ok(());
    }
    if entries.is_empty() {
        writeln!(writer, "No scans recorded.")?;
        return Ok(());
    }
    for entry in &entries {
        writeln!(writer, "{}", roster_line(entry))?;
    }
    Ok(())
}

fn roster_line(entry: &RosterEntry) -> String {
    let session = &entry.session;
    let check_out = session
        .check_out_time
        .map_or_else(|| "-".to_string(), format_time);
    format!(
        "#{} {} {} [{}] in {} out {} ({} min)",
        session.id,
        session.participant_id,
        entry.participant_name,
        session.status,
        format_time(session.check_in_time),
        check_out,
        format_minutes(session.duration_minutes),
    )
}
