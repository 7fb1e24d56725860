//! Error taxonomy for attendance operations.

use thiserror::Error;

use crate::types::{EventId, ParticipantId};

/// Errors surfaced by the decision engine and finalizer.
///
/// Every variant except [`AttendanceError::StoreUnavailable`] is caused by
/// the request itself and will fail the same way if retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttendanceError {
    /// The identifier was blank or the event ID missing.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("event not found: {0}")]
    EventNotFound(EventId),

    #[error("event {0} is no longer active")]
    EventInactive(EventId),

    #[error("no participant registered with identifier {0}")]
    ParticipantUnknown(ParticipantId),

    /// The backing store could not complete the operation. Safe to retry.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl AttendanceError {
    /// Whether the same request may succeed if sent again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

/// Errors reported by an [`AttendanceStore`](crate::store::AttendanceStore).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or failed mid-operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Another writer changed the record first.
    #[error("write conflict: {0}")]
    Conflict(String),

    /// A stored row could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// The write was refused because the event stopped accepting scans
    /// after it was read.
    #[error("event {0} closed before the write landed")]
    EventClosed(EventId),
}

impl From<StoreError> for AttendanceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(message) => Self::StoreUnavailable(message),
            StoreError::EventClosed(event_id) => Self::EventInactive(event_id),
            other => Self::StoreUnavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_store_failures_are_retryable() {
        let event = EventId::new(1).unwrap();
        assert!(AttendanceError::StoreUnavailable("timeout".into()).is_retryable());
        assert!(!AttendanceError::EventNotFound(event).is_retryable());
        assert!(!AttendanceError::EventInactive(event).is_retryable());
        assert!(!AttendanceError::InvalidInput("blank".into()).is_retryable());
    }

    #[test]
    fn store_error_maps_to_unavailable() {
        let err: AttendanceError = StoreError::Unavailable("disk I/O error".into()).into();
        assert_eq!(err.to_string(), "store unavailable: disk I/O error");

        let err: AttendanceError = StoreError::Corrupt("bad timestamp".into()).into();
        assert_eq!(
            err,
            AttendanceError::StoreUnavailable("corrupt record: bad timestamp".into())
        );
    }

    #[test]
    fn closed_event_maps_to_inactive() {
        let event = EventId::new(3).unwrap();
        let err: AttendanceError = StoreError::EventClosed(event).into();
        assert_eq!(err, AttendanceError::EventInactive(event));
        assert!(!err.is_retryable());
    }
}
