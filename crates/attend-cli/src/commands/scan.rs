//! Scan command for recording a single badge observation.

use std::io::Write;

use anyhow::Result;
use clap::Args;

use super::util::{event_id, open_engine, parse_datetime};
use crate::Config;

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Event the scan belongs to.
    #[arg(short, long)]
    pub event: i64,

    /// Raw identifier read from the badge.
    pub identifier: String,

    /// Record the scan at this RFC 3339 time instead of now.
    #[arg(long)]
    pub at: Option<String>,

    /// Print the full outcome as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run<W: Write>(writer: &mut W, args: &ScanArgs, config: &Config) -> Result<()> {
    let event_id = event_id(args.event)?;
    let engine = open_engine(config)?;
    let now = match &args.at {
        Some(at) => parse_datetime(at)?,
        None => engine.now(),
    };

    let outcome = engine.record_observation_at(event_id, &args.identifier, now)?;
    if args.json {
        writeln!(
            writer,
            "{}",
            serde_json::to_string_pretty(&outcome.to_response())?
        )?;
    } else {
        writeln!(writer, "{}: {}", outcome.action(), outcome.message())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use attend_core::AttendanceError;
    use insta::assert_snapshot;

    use super::*;
    use crate::commands::testing::seeded;

    fn scan(config: &Config, event: i64, id: &str, at: &str) -> Result<String> {
        let args = ScanArgs {
            event,
            identifier: id.to_string(),
            at: Some(at.to_string()),
            json: false,
        };
        let mut output = Vec::new();
        run(&mut output, &args, config)?;
        Ok(String::from_utf8(output)?)
    }

    #[test]
    fn scan_sequence_reports_each_decision() {
        let temp = tempfile::tempdir().unwrap();
        let (config, event) = seeded(temp.path());

        let mut transcript = String::new();
        for at in [
            "2025-03-01T09:00:00Z",
            "2025-03-01T09:00:05Z",
            "2025-03-01T09:00:30Z",
            "2025-03-01T10:35:00Z",
            "2025-03-01T10:40:00Z",
        ] {
            transcript.push_str(&scan(&config, event, "cs21b001", at).unwrap());
        }

        assert_snapshot!(transcript, @r"
        CHECK_IN: Alice Johnson checked in successfully
        DUPLICATE_BLOCKED: Alice Johnson was just scanned; wait 5s before rescanning
        EARLY_CHECKOUT_WARNING: Too early to check out Alice Johnson (0.5 min)
        CHECK_OUT: Alice Johnson: PRESENT (95.0 min)
        DUPLICATE_BLOCKED: Alice Johnson is already marked PRESENT
        ");
    }

    #[test]
    fn scan_json_includes_action_tag() {
        let temp = tempfile::tempdir().unwrap();
        let (config, event) = seeded(temp.path());
        let args = ScanArgs {
            event,
            identifier: "CS21B002".to_string(),
            at: Some("2025-03-01T09:00:00Z".to_string()),
            json: true,
        };
        let mut output = Vec::new();
        run(&mut output, &args, &config).unwrap();

        let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(json["action"], "CHECK_IN");
        assert_eq!(json["participant_name"], "Bob Smith");
        assert_eq!(json["status"], "PENDING");
    }

    #[test]
    fn unknown_identifier_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let (config, event) = seeded(temp.path());
        let err = scan(&config, event, "ZZZZ", "2025-03-01T09:00:00Z").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AttendanceError>(),
            Some(AttendanceError::ParticipantUnknown(_))
        ));
    }
}
