//! Check-in / check-out decision logic.
//!
//! [`decide`] is a pure function of the timing policy, the event, the
//! existing session (if any) and the current instant. It never touches
//! storage; the engine applies the returned [`Decision`].
//!
//! # Rules
//!
//! 1. No session yet: check in.
//! 2. Any existing session scanned again within the debounce window of its
//!    last action (checkout if set, else check-in): blocked as a duplicate.
//! 3. A session already graded `PRESENT`: blocked, presence is never
//!    downgraded by a stray scan.
//! 4. Otherwise, a session checked in less than the minimum checkout time
//!    ago gets a warning and stays unchanged.
//! 5. Otherwise the session is graded from its original check-in time:
//!    present when the stay meets `duration * percent / 100` minutes.
//!
//! Rule 5 also applies to a session already graded `ABSENT`, so a third
//! scan re-grades it against the original check-in.

use chrono::{DateTime, Duration, Utc};

use crate::event::Event;
use crate::policy::DecisionPolicy;
use crate::session::AttendanceSession;
use crate::status::AttendanceStatus;

/// What an observation should do to its session.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Create a pending session checked in now.
    CheckIn,
    /// Grade the session and record the checkout.
    CheckOut(Checkout),
    /// Leave the session unchanged.
    DuplicateBlocked(BlockReason),
    /// Leave the session unchanged; the stay is too short to be a checkout.
    EarlyCheckoutWarning { elapsed_minutes: f64 },
}

/// Grading result of a checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkout {
    pub check_out_time: DateTime<Utc>,
    pub duration_minutes: f64,
    pub required_minutes: f64,
    pub status: AttendanceStatus,
}

/// Why a repeat observation was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// Scanned again before the debounce window elapsed.
    Debounce { retry_after: Duration },
    /// Already graded present.
    AlreadyPresent,
}

/// Decides the effect of an observation at `now`.
pub fn decide(
    policy: &DecisionPolicy,
    event: &Event,
    existing: Option<&AttendanceSession>,
    now: DateTime<Utc>,
) -> Decision {
    existing.map_or(Decision::CheckIn, |session| {
        decide_existing(policy, event, session, now)
    })
}

/// Decides the effect of an observation on a session that already exists.
pub fn decide_existing(
    policy: &DecisionPolicy,
    event: &Event,
    session: &AttendanceSession,
    now: DateTime<Utc>,
) -> Decision {
    let since_last_action = now.signed_duration_since(session.last_action_time());
    if since_last_action < policy.debounce_window {
        return Decision::DuplicateBlocked(BlockReason::Debounce {
            retry_after: policy.debounce_window - since_last_action,
        });
    }

    if session.check_out_time.is_some() && session.status == AttendanceStatus::Present {
        return Decision::DuplicateBlocked(BlockReason::AlreadyPresent);
    }

    let stay = now.signed_duration_since(session.check_in_time);
    let duration_minutes = minutes(stay);
    if stay < policy.min_checkout {
        return Decision::EarlyCheckoutWarning {
            elapsed_minutes: duration_minutes,
        };
    }

    let required_minutes = event.required_minutes();
    let status = if duration_minutes >= required_minutes {
        AttendanceStatus::Present
    } else {
        AttendanceStatus::Absent
    };

    Decision::CheckOut(Checkout {
        check_out_time: now,
        duration_minutes,
        required_minutes,
        status,
    })
}

/// Converts a duration to minutes, rounded to two decimals.
#[expect(
    clippy::cast_precision_loss,
    reason = "attendance spans are far below 2^52 milliseconds"
)]
pub fn minutes(duration: Duration) -> f64 {
    let raw = duration.num_milliseconds() as f64 / 60_000.0;
    (raw * 100.0).round() / 100.0
}
