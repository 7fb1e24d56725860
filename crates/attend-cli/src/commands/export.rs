//! Export command for writing an event's attendance sheet.
//!
//! Rows are ordered by participant identifier. CSV columns:
//! `Roll No,Participant Name,Department,Year,Check-In Time,Check-Out Time,Duration (min),Status`.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use attend_core::{Event, RosterEntry};
use attend_db::format_timestamp;
use clap::{Args, ValueEnum};

use super::util::{event_id, open_database};
use crate::Config;

pub const CSV_HEADER: &str = "Roll No,Participant Name,Department,Year,Check-In Time,Check-Out Time,Duration (min),Status";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    /// One JSON object per line.
    Jsonl,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Event ID.
    pub event_id: i64,

    #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
    pub format: ExportFormat,

    /// Write to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run<W: Write>(writer: &mut W, args: &ExportArgs, config: &Config) -> Result<()> {
    let id = event_id(args.event_id)?;
    let db = open_database(config)?;
    if db.event(id)?.is_none() {
        bail!("event not found: {id}");
    }
    let rows = db.export_rows(id)?;
    let rendered = match args.format {
        ExportFormat::Csv => render_csv(&rows),
        ExportFormat::Jsonl => render_json_lines(&rows)?,
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            writeln!(writer, "Exported {} row(s) to {}", rows.len(), path.display())?;
        }
        None => writer.write_all(rendered.as_bytes())?,
    }
    Ok(())
}

/// Renders rows as CSV with a header line.
pub fn render_csv(rows: &[RosterEntry]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for row in rows {
        let session = &row.session;
        let fields = [
            session.participant_id.to_string(),
            row.participant_name.clone(),
            row.department.clone().unwrap_or_default(),
            row.year.map(|y| y.to_string()).unwrap_or_default(),
            format_timestamp(session.check_in_time),
            session
                .check_out_time
                .map(format_timestamp)
                .unwrap_or_default(),
            session
                .duration_minutes
                .map(|m| m.to_string())
                .unwrap_or_default(),
            session.status.to_string(),
        ];
        let line: Vec<String> = fields.iter().map(String::as_str).map(csv_field).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

/// Renders rows as newline-delimited JSON.
pub fn render_json_lines(rows: &[RosterEntry]) -> Result<String> {
    let mut out = String::new();
    for row in rows {
        out.push_str(&serde_json::to_string(row)?);
        out.push('\n');
    }
    Ok(out)
}

/// Suggested download name, e.g. `attendance_Systems_Seminar_2025-03-01.csv`.
pub fn export_filename(event: &Event) -> String {
    let title: Vec<&str> = event.title.split_whitespace().collect();
    format!("attendance_{}_{}.csv", title.join("_"), event.event_date)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::commands::scan::{self, ScanArgs};
    use crate::commands::testing::seeded;

    fn scan_at(config: &Config, event: i64, id: &str, at: &str) {
        let args = ScanArgs {
            event,
            identifier: id.to_string(),
            at: Some(at.to_string()),
            json: false,
        };
        scan::run(&mut Vec::new(), &args, config).unwrap();
    }

    #[test]
    fn csv_orders_by_identifier() {
        let temp = tempfile::tempdir().unwrap();
        let (config, event) = seeded(temp.path());
        scan_at(&config, event, "CS21B003", "2025-03-01T09:00:00Z");
        scan_at(&config, event, "CS21B001", "2025-03-01T09:01:00Z");
        scan_at(&config, event, "CS21B001", "2025-03-01T10:40:30Z");

        let args = ExportArgs {
            event_id: event,
            format: ExportFormat::Csv,
            output: None,
        };
        let mut output = Vec::new();
        run(&mut output, &args, &config).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Roll No,Participant Name,Department,Year,Check-In Time,Check-Out Time,Duration (min),Status
        CS21B001,Alice Johnson,CSE,3,2025-03-01T09:01:00.000Z,2025-03-01T10:40:30.000Z,99.5,PRESENT
        CS21B003,Carol White,,,2025-03-01T09:00:00.000Z,,,PENDING
        ");
    }

    #[test]
    fn json_lines_writes_one_object_per_row() {
        let temp = tempfile::tempdir().unwrap();
        let (config, event) = seeded(temp.path());
        scan_at(&config, event, "CS21B001", "2025-03-01T09:00:00Z");
        scan_at(&config, event, "CS21B002", "2025-03-01T09:00:00Z");

        let path = temp.path().join("out.jsonl");
        let args = ExportArgs {
            event_id: event,
            format: ExportFormat::Jsonl,
            output: Some(path.clone()),
        };
        let mut output = Vec::new();
        run(&mut output, &args, &config).unwrap();
        assert!(String::from_utf8(output).unwrap().starts_with("Exported 2 row(s)"));

        let written = std::fs::read_to_string(path).unwrap();
        let lines: Vec<serde_json::Value> = written
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["participant_id"], "CS21B002");
    }

    #[test]
    fn fields_with_commas_are_quoted() {
        assert_eq!(csv_field("Smith, Jr."), "\"Smith, Jr.\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_field("plain"), "plain");
    }

    #[test]
    fn filename_replaces_whitespace() {
        let temp = tempfile::tempdir().unwrap();
        let (config, event) = seeded(temp.path());
        let db = open_database(&config).unwrap();
        let event = db.event(event_id(event).unwrap()).unwrap().unwrap();
        assert_eq!(
            export_filename(&event),
            "attendance_Systems_Seminar_2025-03-01.csv"
        );
    }
}
