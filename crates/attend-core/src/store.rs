//! Storage seam between the decision engine and persistence.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::StoreError;
use crate::event::Event;
use crate::participant::Participant;
use crate::session::{AttendanceSession, NewSession};
use crate::status::AttendanceStatus;
use crate::types::{EventId, ParticipantId, SessionId};

/// Persistence operations the engine needs.
///
/// Implementations must enforce at most one session per
/// (participant, event) pair and apply [`AttendanceStore::update_session`]
/// only when the stored row still matches `previous`.
pub trait AttendanceStore: Send + Sync {
    fn event(&self, id: EventId) -> Result<Option<Event>, StoreError>;

    fn participant(&self, id: &ParticipantId) -> Result<Option<Participant>, StoreError>;

    fn session(
        &self,
        participant_id: &ParticipantId,
        event_id: EventId,
    ) -> Result<Option<AttendanceSession>, StoreError>;

    fn event_sessions(&self, event_id: EventId) -> Result<Vec<AttendanceSession>, StoreError>;

    /// Creates a pending session, but only while its event is active.
    ///
    /// Returns [`StoreError::Conflict`] if the pair already has one or the
    /// event is gone, and [`StoreError::EventClosed`] if the event was
    /// deactivated.
    fn insert_session(&self, session: NewSession) -> Result<AttendanceSession, StoreError>;

    /// Replaces `previous` with `next`, but only while its event is active.
    ///
    /// Returns [`StoreError::Conflict`] if the stored session no longer
    /// matches `previous` in status and checkout time, and
    /// [`StoreError::EventClosed`] if the event was deactivated.
    fn update_session(
        &self,
        previous: &AttendanceSession,
        next: &AttendanceSession,
    ) -> Result<(), StoreError>;

    /// Marks every pending session of the event absent and deactivates the
    /// event, as one atomic step. Returns the number of sessions changed.
    fn finalize_event(&self, event_id: EventId) -> Result<usize, StoreError>;
}

impl<S: AttendanceStore + ?Sized> AttendanceStore for std::sync::Arc<S> {
    fn event(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        (**self).event(id)
    }

    fn participant(&self, id: &ParticipantId) -> Result<Option<Participant>, StoreError> {
        (**self).participant(id)
    }

    fn session(
        &self,
        participant_id: &ParticipantId,
        event_id: EventId,
    ) -> Result<Option<AttendanceSession>, StoreError> {
        (**self).session(participant_id, event_id)
    }

    fn event_sessions(&self, event_id: EventId) -> Result<Vec<AttendanceSession>, StoreError> {
        (**self).event_sessions(event_id)
    }

    fn insert_session(&self, session: NewSession) -> Result<AttendanceSession, StoreError> {
        (**self).insert_session(session)
    }

    fn update_session(
        &self,
        previous: &AttendanceSession,
        next: &AttendanceSession,
    ) -> Result<(), StoreError> {
        (**self).update_session(previous, next)
    }

    fn finalize_event(&self, event_id: EventId) -> Result<usize, StoreError> {
        (**self).finalize_event(event_id)
    }
}

/// Same row, judged by the fields a competing writer would change.
fn same_revision(stored: &AttendanceSession, previous: &AttendanceSession) -> bool {
    stored.status == previous.status && stored.check_out_time == previous.check_out_time
}

#[derive(Debug, Default)]
struct MemoryState {
    events: HashMap<EventId, Event>,
    participants: HashMap<ParticipantId, Participant>,
    sessions: HashMap<(ParticipantId, EventId), AttendanceSession>,
    next_session_id: i64,
}

impl MemoryState {
    /// Session writes land only while the event accepts scans.
    fn writable(&self, event_id: EventId) -> Result<(), StoreError> {
        match self.events.get(&event_id) {
            Some(event) if event.active => Ok(()),
            Some(_) => Err(StoreError::EventClosed(event_id)),
            None => Err(StoreError::Conflict(format!("event {event_id} was removed"))),
        }
    }
}

/// In-process store used by tests and embedders without a database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_event(&self, event: Event) {
        self.state().events.insert(event.id, event);
    }

    pub fn add_participant(&self, participant: Participant) {
        self.state()
            .participants
            .insert(participant.participant_id.clone(), participant);
    }

    /// Inserts a session as-is, bypassing the check-in path.
    pub fn put_session(&self, session: AttendanceSession) {
        let mut state = self.state();
        state.next_session_id = state.next_session_id.max(session.id.get());
        state.sessions.insert(
            (session.participant_id.clone(), session.event_id),
            session,
        );
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.state().sessions.len()
    }
}

impl AttendanceStore for MemoryStore {
    fn event(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        Ok(self.state().events.get(&id).cloned())
    }

    fn participant(&self, id: &ParticipantId) -> Result<Option<Participant>, StoreError> {
        Ok(self.state().participants.get(id).cloned())
    }

    fn session(
        &self,
        participant_id: &ParticipantId,
        event_id: EventId,
    ) -> Result<Option<AttendanceSession>, StoreError> {
        Ok(self
            .state()
            .sessions
            .get(&(participant_id.clone(), event_id))
            .cloned())
    }

    fn event_sessions(&self, event_id: EventId) -> Result<Vec<AttendanceSession>, StoreError> {
        let mut sessions: Vec<_> = self
            .state()
            .sessions
            .values()
            .filter(|s| s.event_id == event_id)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.check_in_time);
        Ok(sessions)
    }

    fn insert_session(&self, session: NewSession) -> Result<AttendanceSession, StoreError> {
        let mut state = self.state();
        state.writable(session.event_id)?;
        let key = (session.participant_id.clone(), session.event_id);
        if state.sessions.contains_key(&key) {
            return Err(StoreError::Conflict(format!(
                "session already exists for {} in event {}",
                session.participant_id, session.event_id
            )));
        }
        state.next_session_id += 1;
        let id = SessionId::new(state.next_session_id)
            .map_err(|err| StoreError::Corrupt(err.to_string()))?;
        let created = AttendanceSession {
            id,
            participant_id: session.participant_id,
            event_id: session.event_id,
            check_in_time: session.check_in_time,
            check_out_time: None,
            duration_minutes: None,
            status: AttendanceStatus::Pending,
        };
        state.sessions.insert(key, created.clone());
        Ok(created)
    }

    fn update_session(
        &self,
        previous: &AttendanceSession,
        next: &AttendanceSession,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        state.writable(previous.event_id)?;
        let key = (previous.participant_id.clone(), previous.event_id);
        match state.sessions.get_mut(&key) {
            Some(stored) if same_revision(stored, previous) => {
                *stored = next.clone();
                Ok(())
            }
            _ => Err(StoreError::Conflict(format!(
                "session {} changed concurrently",
                previous.id
            ))),
        }
    }

    fn finalize_event(&self, event_id: EventId) -> Result<usize, StoreError> {
        let mut state = self.state();
        let mut changed = 0;
        for session in state.sessions.values_mut() {
            if session.event_id == event_id && session.status.is_pending() {
                session.status = AttendanceStatus::Absent;
                changed += 1;
            }
        }
        if let Some(event) = state.events.get_mut(&event_id) {
            event.active = false;
        }
        Ok(changed)
    }
}

/// A store that fails every call, for exercising error paths.
#[derive(Debug, Clone)]
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> Result<T, StoreError> {
        Err(StoreError::Unavailable(self.reason.clone()))
    }
}

impl AttendanceStore for UnavailableStore {
    fn event(&self, _id: EventId) -> Result<Option<Event>, StoreError> {
        self.fail()
    }

    fn participant(&self, _id: &ParticipantId) -> Result<Option<Participant>, StoreError> {
        self.fail()
    }

    fn session(
        &self,
        _participant_id: &ParticipantId,
        _event_id: EventId,
    ) -> Result<Option<AttendanceSession>, StoreError> {
        self.fail()
    }

    fn event_sessions(&self, _event_id: EventId) -> Result<Vec<AttendanceSession>, StoreError> {
        self.fail()
    }

    fn insert_session(&self, _session: NewSession) -> Result<AttendanceSession, StoreError> {
        self.fail()
    }

    fn update_session(
        &self,
        _previous: &AttendanceSession,
        _next: &AttendanceSession,
    ) -> Result<(), StoreError> {
        self.fail()
    }

    fn finalize_event(&self, _event_id: EventId) -> Result<usize, StoreError> {
        self.fail()
    }
}
