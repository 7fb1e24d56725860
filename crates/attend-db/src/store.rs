use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use attend_core::{
    AttendanceSession, AttendanceStore, Event, EventId, NewSession, Participant, ParticipantId,
    StoreError,
};
use tracing::warn;

use crate::{Database, DbError};

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        // A missing event surfaces as a foreign key failure; the engine's
        // re-read reports it as not found.
        if err.is_unique_violation() || err.is_foreign_key_violation() {
            return Self::Conflict(err.to_string());
        }
        match err {
            DbError::Sqlite(err) => Self::Unavailable(err.to_string()),
            DbError::EventClosed(event_id) => Self::EventClosed(event_id),
            other => Self::Corrupt(other.to_string()),
        }
    }
}

/// Classifies a session write that matched no row. An inactive event is
/// reported as closed; anything else is a conflict for the engine to re-read.
fn unwritten(db: &Database, event_id: EventId, conflict: String) -> StoreError {
    match db.event(event_id) {
        Ok(Some(event)) if !event.active => StoreError::EventClosed(event_id),
        Ok(_) => StoreError::Conflict(conflict),
        Err(err) => err.into(),
    }
}

/// [`AttendanceStore`] backed by a single SQLite connection.
pub struct SqliteStore {
    db: Mutex<Database>,
}

impl SqliteStore {
    pub const fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    pub fn open(path: &Path) -> Result<Self, DbError> {
        Ok(Self::new(Database::open(path)?))
    }

    /// Exclusive access to the connection for administrative queries.
    pub fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AttendanceStore for SqliteStore {
    fn event(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        Ok(self.lock().event(id)?)
    }

    fn participant(&self, id: &ParticipantId) -> Result<Option<Participant>, StoreError> {
        Ok(self.lock().participant(id)?)
    }

    fn session(
        &self,
        participant_id: &ParticipantId,
        event_id: EventId,
    ) -> Result<Option<AttendanceSession>, StoreError> {
        Ok(self.lock().session(participant_id, event_id)?)
    }

    fn event_sessions(&self, event_id: EventId) -> Result<Vec<AttendanceSession>, StoreError> {
        Ok(self.lock().event_sessions(event_id)?)
    }

    fn insert_session(&self, session: NewSession) -> Result<AttendanceSession, StoreError> {
        let db = self.lock();
        match db.insert_session(&session) {
            Err(DbError::EventClosed(event_id)) => {
                warn!(event_id = %event_id, "check-in refused, event no longer open");
                Err(unwritten(&db, event_id, format!("event {event_id} was removed")))
            }
            other => Ok(other?),
        }
    }

    fn update_session(
        &self,
        previous: &AttendanceSession,
        next: &AttendanceSession,
    ) -> Result<(), StoreError> {
        let db = self.lock();
        if db.update_session(previous, next)? {
            Ok(())
        } else {
            warn!(session_id = %previous.id, "session or its event changed since it was read");
            Err(unwritten(
                &db,
                previous.event_id,
                format!("session {} changed concurrently", previous.id),
            ))
        }
    }

    fn finalize_event(&self, event_id: EventId) -> Result<usize, StoreError> {
        Ok(self.lock().finalize_event(event_id)?)
    }
}
