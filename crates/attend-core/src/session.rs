//! Per-participant, per-event attendance sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::AttendanceStatus;
use crate::types::{EventId, ParticipantId, SessionId};

/// The single attendance record for one (participant, event) pair.
///
/// A `Pending` session never has a checkout time. A resolved session has a
/// checkout time when an observation graded it, and none when the event was
/// finalized while it was still pending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceSession {
    pub id: SessionId,
    pub participant_id: ParticipantId,
    pub event_id: EventId,
    pub check_in_time: DateTime<Utc>,
    #[serde(default)]
    pub check_out_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_minutes: Option<f64>,
    pub status: AttendanceStatus,
}

impl AttendanceSession {
    /// The most recent observation that changed this session.
    #[must_use]
    pub fn last_action_time(&self) -> DateTime<Utc> {
        self.check_out_time.unwrap_or(self.check_in_time)
    }

    /// Returns a copy graded at `check_out_time`.
    #[must_use]
    pub fn checked_out(
        &self,
        check_out_time: DateTime<Utc>,
        duration_minutes: f64,
        status: AttendanceStatus,
    ) -> Self {
        Self {
            check_out_time: Some(check_out_time),
            duration_minutes: Some(duration_minutes),
            status,
            ..self.clone()
        }
    }

    /// Returns a copy with `status` forced by an administrator.
    ///
    /// Forcing `Pending` drops the checkout so the session can be checked
    /// out again.
    #[must_use]
    pub fn overridden(&self, status: AttendanceStatus) -> Self {
        if status.is_pending() {
            Self {
                check_out_time: None,
                duration_minutes: None,
                status,
                ..self.clone()
            }
        } else {
            Self {
                status,
                ..self.clone()
            }
        }
    }
}

/// A session about to be created by a check-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub participant_id: ParticipantId,
    pub event_id: EventId,
    pub check_in_time: DateTime<Utc>,
}
