//! Registered participants.

use serde::{Deserialize, Serialize};

use crate::types::{ParticipantId, ValidationError};

/// A participant who may be scanned into events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Normalized identifier encoded on the participant's badge.
    #[serde(alias = "roll_no")]
    pub participant_id: ParticipantId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
}

impl Participant {
    /// Builds a participant from raw registration input.
    ///
    /// The identifier is normalized and the name trimmed; both must be
    /// non-empty.
    pub fn new(
        raw_id: &str,
        name: &str,
        department: Option<String>,
        year: Option<u16>,
    ) -> Result<Self, ValidationError> {
        let participant_id = ParticipantId::new(raw_id)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::Empty { field: "name" });
        }
        Ok(Self {
            participant_id,
            name: name.to_string(),
            department: department
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            year,
        })
    }
}

/// Loosely typed registration row, as received from bulk imports.
///
/// Rows are validated one at a time so a single bad row is skipped rather
/// than failing the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInput {
    #[serde(default, alias = "roll_no")]
    pub participant_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub year: Option<u16>,
}

impl TryFrom<ParticipantInput> for Participant {
    type Error = ValidationError;

    fn try_from(input: ParticipantInput) -> Result<Self, Self::Error> {
        let raw_id = input.participant_id.ok_or(ValidationError::Empty {
            field: "participant ID",
        })?;
        let name = input
            .name
            .ok_or(ValidationError::Empty { field: "name" })?;
        Self::new(&raw_id, &name, input.department, input.year)
    }
}
