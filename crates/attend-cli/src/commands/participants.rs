//! Participants command for the registration list.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use attend_core::{Participant, ParticipantId, ParticipantInput};
use chrono::Utc;
use clap::Subcommand;

use super::util::open_database;
use crate::Config;

#[derive(Debug, Subcommand)]
pub enum ParticipantsAction {
    /// Register one participant.
    Add {
        /// Badge identifier.
        id: String,
        /// Full name.
        name: String,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        year: Option<u16>,
    },
    /// Register participants from a JSON array file.
    ///
    /// Rows with missing fields or an already registered identifier are
    /// skipped.
    Import {
        file: PathBuf,
    },
    /// List registered participants.
    List {
        /// Match identifier or name, case-insensitively.
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Remove a participant and their attendance records.
    Delete {
        id: String,
    },
}

pub fn run<W: Write>(writer: &mut W, action: &ParticipantsAction, config: &Config) -> Result<()> {
    match action {
        ParticipantsAction::Add {
            id,
            name,
            department,
            year,
        } => {
            let participant = Participant::new(id, name, department.clone(), *year)?;
            let db = open_database(config)?;
            db.add_participant(&participant, Utc::now())?;
            writeln!(
                writer,
                "Added {} ({})",
                participant.participant_id, participant.name
            )?;
        }
        ParticipantsAction::Import { file } => {
            let content = std::fs::read_to_string(file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let rows: Vec<ParticipantInput> = serde_json::from_str(&content)
                .with_context(|| format!("{} is not a JSON array of participants", file.display()))?;
            let mut db = open_database(config)?;
            let summary = db.import_participants(rows, Utc::now())?;
            writeln!(
                writer,
                "Imported {} participant(s), skipped {}",
                summary.added, summary.skipped
            )?;
        }
        ParticipantsAction::List { search, json } => {
            let db = open_database(config)?;
            let participants = db.list_participants(search.as_deref())?;
            if *json {
                writeln!(writer, "{}", serde_json::to_string_pretty(&participants)?)?;
            } else if participants.is_empty() {
                writeln!(writer, "No participants.")?;
            } else {
                for participant in &participants {
                    writeln!(writer, "{}", participant_line(participant))?;
                }
            }
        }
        ParticipantsAction::Delete { id } => {
            let id = ParticipantId::new(id)?;
            let db = open_database(config)?;
            if !db.delete_participant(&id)? {
                bail!("participant not found: {id}");
            }
            writeln!(writer, "Deleted {id}")?;
        }
    }
    Ok(())
}

fn participant_line(participant: &Participant) -> String {
    let mut line = format!("{} {}", participant.participant_id, participant.name);
    match (&participant.department, participant.year) {
        (Some(department), Some(year)) => line.push_str(&format!(" ({department}, year {year})")),
        (Some(department), None) => line.push_str(&format!(" ({department})")),
        (None, Some(year)) => line.push_str(&format!(" (year {year})")),
        (None, None) => {}
    }
    line
}

#[cfg(test)]
mod tests {
    use attend_db::DbError;
    use insta::assert_snapshot;

    use super::*;
    use crate::commands::testing::seeded;

    fn output_of(action: &ParticipantsAction, config: &Config) -> Result<String> {
        let mut output = Vec::new();
        run(&mut output, action, config)?;
        Ok(String::from_utf8(output)?)
    }

    fn list(config: &Config, search: Option<&str>) -> String {
        let action = ParticipantsAction::List {
            search: search.map(str::to_string),
            json: false,
        };
        output_of(&action, config).unwrap()
    }

    #[test]
    fn list_orders_by_identifier() {
        let temp = tempfile::tempdir().unwrap();
        let (config, _event) = seeded(temp.path());
        assert_snapshot!(list(&config, None), @r"
        CS21B001 Alice Johnson (CSE, year 3)
        CS21B002 Bob Smith (ECE, year 2)
        CS21B003 Carol White
        ");
    }

    #[test]
    fn search_matches_name_case_insensitively() {
        let temp = tempfile::tempdir().unwrap();
        let (config, _event) = seeded(temp.path());
        assert_snapshot!(list(&config, Some("SMITH")), @"CS21B002 Bob Smith (ECE, year 2)");
        assert_snapshot!(list(&config, Some("nobody")), @"No participants.");
    }

    #[test]
    fn add_normalizes_identifier() {
        let temp = tempfile::tempdir().unwrap();
        let (config, _event) = seeded(temp.path());
        let action = ParticipantsAction::Add {
            id: "  ee22a010 ".to_string(),
            name: "Dan Brown".to_string(),
            department: None,
            year: Some(1),
        };
        assert_snapshot!(output_of(&action, &config).unwrap(), @"Added EE22A010 (Dan Brown)");

        let err = output_of(&action, &config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DbError>(),
            Some(DbError::DuplicateParticipant(_))
        ));
    }

    #[test]
    fn import_skips_bad_and_duplicate_rows() {
        let temp = tempfile::tempdir().unwrap();
        let (config, _event) = seeded(temp.path());
        let file = temp.path().join("participants.json");
        std::fs::write(
            &file,
            r#"[
                {"roll_no": "cs21b004", "name": "Eve Adams", "department": "MECH"},
                {"participant_id": "CS21B001", "name": "Alice Again"},
                {"participant_id": "CS21B005"},
                {"participant_id": "CS21B006", "name": "Frank Li", "year": 4}
            ]"#,
        )
        .unwrap();

        let output = output_of(&ParticipantsAction::Import { file }, &config).unwrap();
        assert_snapshot!(output, @"Imported 2 participant(s), skipped 2");
        assert_snapshot!(list(&config, Some("cs21b00")), @r"
        CS21B001 Alice Johnson (CSE, year 3)
        CS21B002 Bob Smith (ECE, year 2)
        CS21B003 Carol White
        CS21B004 Eve Adams (MECH)
        CS21B006 Frank Li (year 4)
        ");
    }

    #[test]
    fn delete_removes_participant() {
        let temp = tempfile::tempdir().unwrap();
        let (config, _event) = seeded(temp.path());
        let action = ParticipantsAction::Delete {
            id: "cs21b003".to_string(),
        };
        assert_snapshot!(output_of(&action, &config).unwrap(), @"Deleted CS21B003");
        let err = output_of(&action, &config).unwrap_err();
        assert_eq!(err.to_string(), "participant not found: CS21B003");
    }
}
