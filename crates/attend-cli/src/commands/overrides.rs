//! Override command for forcing a session's status.

use std::io::Write;

use anyhow::{Context, Result, bail};
use attend_core::{AttendanceStatus, SessionId};
use clap::Args;

use super::util::{format_minutes, open_database};
use crate::Config;

#[derive(Debug, Args)]
pub struct OverrideArgs {
    /// Session ID, as shown by `roster`.
    pub session_id: i64,

    /// New status: PENDING, PRESENT or ABSENT. PENDING clears the checkout.
    pub status: AttendanceStatus,
}

pub fn run<W: Write>(writer: &mut W, args: &OverrideArgs, config: &Config) -> Result<()> {
    let id = SessionId::new(args.session_id).context("invalid session ID")?;
    let db = open_database(config)?;
    let Some(session) = db.override_status(id, args.status)? else {
        bail!("session not found: {id}");
    };
    writeln!(
        writer,
        "Session {} ({} at event {}) is now {} ({} min)",
        session.id,
        session.participant_id,
        session.event_id,
        session.status,
        format_minutes(session.duration_minutes)
    )?;
    Ok(())
}
