//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::{events, export, overrides, participants, report, scan, serve};

/// Badge-scan attendance tracker.
///
/// Turns repeated scans of a participant's badge into check-ins and
/// checkouts, grades attendance against each event's presence requirement,
/// and closes out open sessions when an event ends.
#[derive(Debug, Parser)]
#[command(name = "attend", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP API for scanner clients.
    Serve(serve::ServeArgs),

    /// Record one badge scan.
    Scan(scan::ScanArgs),

    /// Close an event, marking open sessions absent.
    Finalize(report::EventArgs),

    /// Show present/absent/pending counts for an event.
    Stats(report::EventArgs),

    /// Export an event's attendance as CSV or JSON lines.
    Export(export::ExportArgs),

    /// List an event's sessions, most recent check-in first.
    Roster(report::EventArgs),

    /// Show database location and event summary.
    Status,

    /// Manage events.
    #[command(subcommand)]
    Events(events::EventsAction),

    /// Manage registered participants.
    #[command(subcommand)]
    Participants(participants::ParticipantsAction),

    /// Force a session's status.
    Override(overrides::OverrideArgs),
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn scan_parses_event_and_identifier() {
        let cli = Cli::try_parse_from(["attend", "scan", "--event", "3", "cs21b001"]).unwrap();
        let Some(Commands::Scan(args)) = cli.command else {
            panic!("expected scan command");
        };
        assert_eq!(args.event, 3);
        assert_eq!(args.identifier, "cs21b001");
        assert!(!args.json);
    }

    #[test]
    fn override_parses_status_case_insensitively() {
        let cli = Cli::try_parse_from(["attend", "override", "4", "absent"]).unwrap();
        let Some(Commands::Override(args)) = cli.command else {
            panic!("expected override command");
        };
        assert_eq!(args.session_id, 4);
        assert_eq!(args.status, attend_core::AttendanceStatus::Absent);

        assert!(Cli::try_parse_from(["attend", "override", "4", "late"]).is_err());
    }

    #[test]
    fn events_update_rejects_conflicting_flags() {
        let result =
            Cli::try_parse_from(["attend", "events", "update", "1", "--activate", "--deactivate"]);
        assert!(result.is_err());
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::try_parse_from(["attend", "status", "--verbose", "--config", "a.toml"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("a.toml")));
    }
}
