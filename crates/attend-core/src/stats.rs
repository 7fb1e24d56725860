//! Per-event tallies and roster rows.

use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::participant::Participant;
use crate::session::AttendanceSession;
use crate::status::AttendanceStatus;
use crate::types::EventId;

/// Status counts for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStats {
    pub event_id: EventId,
    pub title: String,
    pub active: bool,
    pub total_scans: usize,
    pub present: usize,
    pub absent: usize,
    pub pending: usize,
}

impl EventStats {
    #[must_use]
    pub fn tally(event: &Event, sessions: &[AttendanceSession]) -> Self {
        let count = |status: AttendanceStatus| sessions.iter().filter(|s| s.status == status).count();
        Self {
            event_id: event.id,
            title: event.title.clone(),
            active: event.active,
            total_scans: sessions.len(),
            present: count(AttendanceStatus::Present),
            absent: count(AttendanceStatus::Absent),
            pending: count(AttendanceStatus::Pending),
        }
    }
}

/// One roster line: a session joined with its participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    #[serde(flatten)]
    pub session: AttendanceSession,
    pub participant_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
}

impl RosterEntry {
    #[must_use]
    pub fn new(session: AttendanceSession, participant: &Participant) -> Self {
        Self {
            session,
            participant_name: participant.name.clone(),
            department: participant.department.clone(),
            year: participant.year,
        }
    }
}

/// Summary returned by finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeSummary {
    pub event_id: EventId,
    pub finalized_count: usize,
}
