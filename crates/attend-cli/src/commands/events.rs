//! Events command for creating and maintaining events.

use std::io::Write;

use anyhow::{Context, Result, bail};
use attend_core::{Event, EventUpdate, NewEvent, PresencePercent};
use chrono::{NaiveDate, Utc};
use clap::{Args, Subcommand};

use super::util::{event_id, open_database, parse_datetime};
use crate::Config;

#[derive(Debug, Subcommand)]
pub enum EventsAction {
    /// Create an event.
    Create(CreateArgs),
    /// List events, newest first.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Change fields of an event.
    Update(UpdateArgs),
    /// Delete an event and its attendance records.
    Delete {
        /// Event ID.
        id: i64,
    },
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub description: Option<String>,

    /// Event date (YYYY-MM-DD).
    #[arg(long)]
    pub date: NaiveDate,

    /// Start time (RFC 3339).
    #[arg(long)]
    pub start: String,

    /// End time (RFC 3339).
    #[arg(long)]
    pub end: String,

    /// Scheduled length in minutes. Defaults to the span from start to end.
    #[arg(long)]
    pub duration: Option<u32>,

    /// Share of the duration a participant must stay, in (0, 100].
    #[arg(long)]
    pub percent: Option<f64>,
}

#[derive(Debug, Clone, Args)]
pub struct UpdateArgs {
    /// Event ID.
    pub id: i64,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub date: Option<NaiveDate>,

    #[arg(long)]
    pub start: Option<String>,

    #[arg(long)]
    pub end: Option<String>,

    #[arg(long)]
    pub duration: Option<u32>,

    #[arg(long)]
    pub percent: Option<f64>,

    /// Accept scans again after a finalize.
    #[arg(long, conflicts_with = "deactivate")]
    pub activate: bool,

    /// Stop accepting scans without sweeping pending sessions.
    #[arg(long)]
    pub deactivate: bool,
}

pub fn run<W: Write>(writer: &mut W, action: &EventsAction, config: &Config) -> Result<()> {
    match action {
        EventsAction::Create(args) => create(writer, args, config),
        EventsAction::List { json } => list(writer, *json, config),
        EventsAction::Update(args) => update(writer, args, config),
        EventsAction::Delete { id } => delete(writer, *id, config),
    }
}

fn create<W: Write>(writer: &mut W, args: &CreateArgs, config: &Config) -> Result<()> {
    let start_time = parse_datetime(&args.start)?;
    let end_time = parse_datetime(&args.end)?;
    if end_time <= start_time {
        bail!("end time must be after start time");
    }
    let duration_minutes = match args.duration {
        Some(minutes) => minutes,
        None => u32::try_from((end_time - start_time).num_minutes())
            .context("event is too long")?,
    };
    let input = NewEvent {
        title: args.title.clone(),
        description: args.description.clone(),
        event_date: args.date,
        start_time,
        end_time,
        duration_minutes,
        required_presence_percent: args.percent.map(PresencePercent::new).transpose()?,
    };

    let db = open_database(config)?;
    let event = db.create_event(&input, config.presence_percent()?, Utc::now())?;
    writeln!(writer, "Created event {}: {}", event.id, describe(&event))?;
    writeln!(writer, "Session token: {}", event.session_token)?;
    Ok(())
}

fn list<W: Write>(writer: &mut W, json: bool, config: &Config) -> Result<()> {
    let db = open_database(config)?;
    let events = db.list_events()?;
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&events)?)?;
        return Ok(());
    }
    if events.is_empty() {
        writeln!(writer, "No events.")?;
        return Ok(());
    }
    for event in &events {
        writeln!(writer, "#{} {}", event.id, describe(event))?;
    }
    Ok(())
}

fn update<W: Write>(writer: &mut W, args: &UpdateArgs, config: &Config) -> Result<()> {
    let id = event_id(args.id)?;
    let active = if args.activate {
        Some(true)
    } else if args.deactivate {
        Some(false)
    } else {
        None
    };
    let update = EventUpdate {
        title: args.title.clone(),
        description: args.description.clone(),
        event_date: args.date,
        start_time: args.start.as_deref().map(parse_datetime).transpose()?,
        end_time: args.end.as_deref().map(parse_datetime).transpose()?,
        duration_minutes: args.duration,
        required_presence_percent: args.percent.map(PresencePercent::new).transpose()?,
        active,
    };

    let db = open_database(config)?;
    let Some(event) = db.update_event(id, &update)? else {
        bail!("event not found: {id}");
    };
    writeln!(writer, "Updated event {}: {}", event.id, describe(&event))?;
    Ok(())
}

fn delete<W: Write>(writer: &mut W, id: i64, config: &Config) -> Result<()> {
    let id = event_id(id)?;
    let db = open_database(config)?;
    if !db.delete_event(id)? {
        bail!("event not found: {id}");
    }
    writeln!(writer, "Deleted event {id}")?;
    Ok(())
}

fn describe(event: &Event) -> String {
    let state = if event.active { "active" } else { "finalized" };
    format!(
        "{} on {} ({} min, {} required) [{state}]",
        event.title, event.event_date, event.duration_minutes, event.required_presence_percent
    )
}
