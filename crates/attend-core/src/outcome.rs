//! Classified results of observations and their wire representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::BlockReason;
use crate::error::AttendanceError;
use crate::participant::Participant;
use crate::session::AttendanceSession;
use crate::status::AttendanceStatus;
use crate::types::EventId;

/// Action tag reported to scanner clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    CheckIn,
    CheckOut,
    DuplicateBlocked,
    EarlyCheckoutWarning,
}

impl Action {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CheckIn => "CHECK_IN",
            Self::CheckOut => "CHECK_OUT",
            Self::DuplicateBlocked => "DUPLICATE_BLOCKED",
            Self::EarlyCheckoutWarning => "EARLY_CHECKOUT_WARNING",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of recording one observation.
///
/// Each variant carries the session as it stands after the observation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    CheckIn {
        participant: Participant,
        session: AttendanceSession,
    },
    CheckOut {
        participant: Participant,
        session: AttendanceSession,
        required_minutes: f64,
    },
    DuplicateBlocked {
        participant: Participant,
        session: AttendanceSession,
        reason: BlockReason,
    },
    EarlyCheckoutWarning {
        participant: Participant,
        session: AttendanceSession,
        elapsed_minutes: f64,
    },
}

impl Outcome {
    #[must_use]
    pub const fn action(&self) -> Action {
        match self {
            Self::CheckIn { .. } => Action::CheckIn,
            Self::CheckOut { .. } => Action::CheckOut,
            Self::DuplicateBlocked { .. } => Action::DuplicateBlocked,
            Self::EarlyCheckoutWarning { .. } => Action::EarlyCheckoutWarning,
        }
    }

    #[must_use]
    pub const fn participant(&self) -> &Participant {
        match self {
            Self::CheckIn { participant, .. }
            | Self::CheckOut { participant, .. }
            | Self::DuplicateBlocked { participant, .. }
            | Self::EarlyCheckoutWarning { participant, .. } => participant,
        }
    }

    #[must_use]
    pub const fn session(&self) -> &AttendanceSession {
        match self {
            Self::CheckIn { session, .. }
            | Self::CheckOut { session, .. }
            | Self::DuplicateBlocked { session, .. }
            | Self::EarlyCheckoutWarning { session, .. } => session,
        }
    }

    /// Human-readable summary for scanner displays.
    #[must_use]
    pub fn message(&self) -> String {
        let name = &self.participant().name;
        match self {
            Self::CheckIn { .. } => format!("{name} checked in successfully"),
            Self::CheckOut {
                session,
                required_minutes,
                ..
            } => {
                let minutes = session.duration_minutes.unwrap_or_default();
                match session.status {
                    AttendanceStatus::Present => {
                        format!("{name}: PRESENT ({minutes:.1} min)")
                    }
                    _ => format!(
                        "{name}: ABSENT ({minutes:.1} min < {required_minutes:.1} min required)"
                    ),
                }
            }
            Self::DuplicateBlocked { reason, .. } => match reason {
                BlockReason::Debounce { retry_after } => {
                    let wait = retry_after.num_seconds().max(1);
                    format!("{name} was just scanned; wait {wait}s before rescanning")
                }
                BlockReason::AlreadyPresent => format!("{name} is already marked PRESENT"),
            },
            Self::EarlyCheckoutWarning {
                elapsed_minutes, ..
            } => format!("Too early to check out {name} ({elapsed_minutes:.1} min)"),
        }
    }

    /// Flattens the outcome into the response sent to scanner clients.
    #[must_use]
    pub fn to_response(&self) -> ScanResponse {
        let participant = self.participant();
        let session = self.session();
        let (duration_minutes, required_minutes) = match self {
            Self::CheckIn { .. } => (None, None),
            Self::CheckOut {
                required_minutes, ..
            } => (session.duration_minutes, Some(*required_minutes)),
            Self::DuplicateBlocked { .. } => (session.duration_minutes, None),
            Self::EarlyCheckoutWarning {
                elapsed_minutes, ..
            } => (Some(*elapsed_minutes), None),
        };
        ScanResponse {
            action: self.action(),
            participant_id: participant.participant_id.to_string(),
            participant_name: participant.name.clone(),
            department: participant.department.clone(),
            check_in_time: session.check_in_time,
            check_out_time: session.check_out_time,
            duration_minutes,
            required_minutes,
            status: session.status,
            message: self.message(),
        }
    }
}

/// Serialized outcome, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResponse {
    pub action: Action,
    pub participant_id: String,
    pub participant_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    pub check_in_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_out_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_minutes: Option<f64>,
    pub status: AttendanceStatus,
    pub message: String,
}

/// An observation as submitted by a scanner client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    #[serde(default, alias = "roll_no", alias = "rawIdentifier")]
    pub raw_identifier: Option<String>,
    #[serde(default, alias = "eventId")]
    pub event_id: Option<i64>,
}

impl ScanRequest {
    /// Checks that both fields are present before the engine sees them.
    pub fn validate(&self) -> Result<(EventId, &str), AttendanceError> {
        let raw = self
            .raw_identifier
            .as_deref()
            .filter(|raw| !raw.trim().is_empty());
        let (Some(raw), Some(event_id)) = (raw, self.event_id) else {
            return Err(AttendanceError::InvalidInput(
                "raw_identifier and event_id are required".to_string(),
            ));
        };
        let event_id = EventId::new(event_id)
            .map_err(|err| AttendanceError::InvalidInput(err.to_string()))?;
        Ok((event_id, raw))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::event::fixtures::timestamp;
    use crate::types::{ParticipantId, SessionId};

    fn participant() -> Participant {
        Participant::new("a1", "Alice", Some("CSE".into()), Some(3)).unwrap()
    }

    fn session() -> AttendanceSession {
        AttendanceSession {
            id: SessionId::new(9).unwrap(),
            participant_id: ParticipantId::new("A1").unwrap(),
            event_id: EventId::new(1).unwrap(),
            check_in_time: timestamp("2025-03-01T09:00:00Z"),
            check_out_time: None,
            duration_minutes: None,
            status: AttendanceStatus::Pending,
        }
    }

    #[test]
    fn check_in_response_is_tagged() {
        let outcome = Outcome::CheckIn {
            participant: participant(),
            session: session(),
        };
        let json = serde_json::to_value(outcome.to_response()).unwrap();
        assert_eq!(json["action"], "CHECK_IN");
        assert_eq!(json["participant_id"], "A1");
        assert_eq!(json["participant_name"], "Alice");
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["message"], "Alice checked in successfully");
        assert!(json.get("check_out_time").is_none());
        assert!(json.get("duration_minutes").is_none());
    }

    #[test]
    fn absent_checkout_message_names_requirement() {
        let graded = session().checked_out(
            timestamp("2025-03-01T09:50:00Z"),
            50.0,
            AttendanceStatus::Absent,
        );
        let outcome = Outcome::CheckOut {
            participant: participant(),
            session: graded,
            required_minutes: 90.0,
        };
        assert_eq!(
            outcome.message(),
            "Alice: ABSENT (50.0 min < 90.0 min required)"
        );
        let response = outcome.to_response();
        assert_eq!(response.action, Action::CheckOut);
        assert_eq!(response.required_minutes, Some(90.0));
        assert_eq!(response.duration_minutes, Some(50.0));
    }

    #[test]
    fn debounce_message_reports_wait() {
        let outcome = Outcome::DuplicateBlocked {
            participant: participant(),
            session: session(),
            reason: BlockReason::Debounce {
                retry_after: Duration::seconds(5),
            },
        };
        assert_eq!(
            outcome.message(),
            "Alice was just scanned; wait 5s before rescanning"
        );
        assert_eq!(outcome.action().to_string(), "DUPLICATE_BLOCKED");
    }

    #[test]
    fn scan_request_accepts_roll_no_alias() {
        let request: ScanRequest =
            serde_json::from_str(r#"{"roll_no":" a1 ","event_id":4}"#).unwrap();
        let (event_id, raw) = request.validate().unwrap();
        assert_eq!(event_id.get(), 4);
        assert_eq!(raw, " a1 ");
    }

    #[test]
    fn scan_request_requires_both_fields() {
        let missing_event = ScanRequest {
            raw_identifier: Some("A1".into()),
            event_id: None,
        };
        assert!(matches!(
            missing_event.validate(),
            Err(AttendanceError::InvalidInput(_))
        ));

        let blank_id = ScanRequest {
            raw_identifier: Some("   ".into()),
            event_id: Some(1),
        };
        assert!(matches!(
            blank_id.validate(),
            Err(AttendanceError::InvalidInput(_))
        ));

        let zero_event = ScanRequest {
            raw_identifier: Some("A1".into()),
            event_id: Some(0),
        };
        assert!(matches!(
            zero_event.validate(),
            Err(AttendanceError::InvalidInput(_))
        ));
    }
}
