//! Storage layer for attendance tracking.
//!
//! Provides persistence for events, participants and attendance sessions
//! using `rusqlite`.
//!
//! # Thread Safety
//!
//! [`Database`] wraps a `rusqlite::Connection`, which is `Send` but not
//! `Sync`. [`SqliteStore`] puts it behind a mutex so it can back the shared
//! decision engine.
//!
//! # Schema
//!
//! Timestamps are stored as TEXT in RFC 3339 with millisecond precision
//! (e.g. `2025-03-01T09:00:00.000Z`), so lexicographic order matches
//! chronological order. Event dates are stored as `YYYY-MM-DD`.
//!
//! `attendance_sessions` carries `UNIQUE(participant_id, event_id)`: a
//! participant has at most one session per event no matter how many
//! processes write to the file.

mod store;

use std::path::Path;
use std::time::Duration;

use attend_core::{
    AttendanceSession, AttendanceStatus, Event, EventId, EventUpdate, NewEvent, NewSession,
    Participant, ParticipantId, ParticipantInput, PresencePercent, RosterEntry, SessionId,
    ValidationError,
};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

pub use store::SqliteStore;

/// How long a writer waits on a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored timestamp or date could not be parsed.
    #[error("invalid {column} value {value:?}")]
    TimestampParse {
        column: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored or submitted value failed domain validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("participant {0} is already registered")]
    DuplicateParticipant(ParticipantId),
    /// A session write found its event missing or inactive.
    #[error("event {0} is not accepting scans")]
    EventClosed(EventId),
}

impl DbError {
    /// Whether this error is a UNIQUE or PRIMARY KEY constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == ErrorCode::ConstraintViolation
                    && matches!(
                        err.extended_code,
                        rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                            | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    )
            }
            _ => false,
        }
    }

    /// Whether this error is a FOREIGN KEY constraint violation, such as a
    /// session written for an event deleted by another connection.
    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
        )
    }
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

/// Result of a bulk participant import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub added: usize,
    pub skipped: usize,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS participants (
                participant_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                department TEXT,
                year INTEGER,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT,
                event_date TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                duration_minutes INTEGER NOT NULL CHECK (duration_minutes > 0),
                required_presence_percent REAL NOT NULL DEFAULT 75
                    CHECK (required_presence_percent > 0 AND required_presence_percent <= 100),
                session_token TEXT NOT NULL UNIQUE,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_date ON events(event_date);

            -- One row per (participant, event). check_out_time is NULL while
            -- PENDING and after a finalize sweep.
            CREATE TABLE IF NOT EXISTS attendance_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                participant_id TEXT NOT NULL,
                event_id INTEGER NOT NULL,
                check_in_time TEXT NOT NULL,
                check_out_time TEXT,
                duration_minutes REAL,
                status TEXT NOT NULL DEFAULT 'PENDING'
                    CHECK (status IN ('PENDING', 'PRESENT', 'ABSENT')),
                UNIQUE (participant_id, event_id),
                FOREIGN KEY (participant_id) REFERENCES participants(participant_id) ON DELETE CASCADE,
                FOREIGN KEY (event_id) REFERENCES events(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_event ON attendance_sessions(event_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_status ON attendance_sessions(status);
            ",
        )?;
        Ok(())
    }

    // Events

    /// Creates an event, filling in the presence percent and a fresh
    /// session token.
    pub fn create_event(
        &self,
        input: &NewEvent,
        default_percent: PresencePercent,
        created_at: DateTime<Utc>,
    ) -> Result<Event, DbError> {
        input.validate()?;
        let title = input.title.trim().to_string();
        let required_presence_percent = input.required_presence_percent.unwrap_or(default_percent);
        let session_token = Uuid::new_v4().to_string();
        self.conn.execute(
            "
            INSERT INTO events (
                title, description, event_date, start_time, end_time, duration_minutes,
                required_presence_percent, session_token, active, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9)
            ",
            params![
                title,
                input.description,
                format_date(input.event_date),
                format_timestamp(input.start_time),
                format_timestamp(input.end_time),
                input.duration_minutes,
                required_presence_percent.value(),
                session_token,
                format_timestamp(created_at),
            ],
        )?;
        let id = EventId::new(self.conn.last_insert_rowid())?;
        info!(event_id = %id, %title, "event created");
        Ok(Event {
            id,
            title,
            description: input.description.clone(),
            event_date: input.event_date,
            start_time: input.start_time,
            end_time: input.end_time,
            duration_minutes: input.duration_minutes,
            required_presence_percent,
            session_token,
            active: true,
            created_at,
        })
    }

    /// Lists events, newest event date first.
    pub fn list_events(&self) -> Result<Vec<Event>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY event_date DESC, start_time DESC, id DESC"
        ))?;
        let rows = stmt.query_map([], EventRow::from_row)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?.into_event()?);
        }
        Ok(events)
    }

    pub fn event(&self, id: EventId) -> Result<Option<Event>, DbError> {
        self.conn
            .query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
                [id.get()],
                EventRow::from_row,
            )
            .optional()?
            .map(EventRow::into_event)
            .transpose()
    }

    /// Applies a partial update. Returns `None` if the event does not exist.
    pub fn update_event(&self, id: EventId, update: &EventUpdate) -> Result<Option<Event>, DbError> {
        update.validate()?;
        let Some(mut event) = self.event(id)? else {
            return Ok(None);
        };
        update.apply(&mut event);
        self.conn.execute(
            "
            UPDATE events
            SET title = ?2, description = ?3, event_date = ?4, start_time = ?5, end_time = ?6,
                duration_minutes = ?7, required_presence_percent = ?8, active = ?9
            WHERE id = ?1
            ",
            params![
                id.get(),
                event.title,
                event.description,
                format_date(event.event_date),
                format_timestamp(event.start_time),
                format_timestamp(event.end_time),
                event.duration_minutes,
                event.required_presence_percent.value(),
                event.active,
            ],
        )?;
        Ok(Some(event))
    }

    /// Deletes an event and, by cascade, its sessions.
    pub fn delete_event(&self, id: EventId) -> Result<bool, DbError> {
        let deleted = self
            .conn
            .execute("DELETE FROM events WHERE id = ?1", [id.get()])?;
        if deleted > 0 {
            info!(event_id = %id, "event deleted");
        }
        Ok(deleted > 0)
    }

    // Participants

    /// Registers a participant; the identifier must not already exist.
    pub fn add_participant(
        &self,
        participant: &Participant,
        created_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        insert_participant(&self.conn, participant, created_at).map_err(|err| {
            if err.is_unique_violation() {
                DbError::DuplicateParticipant(participant.participant_id.clone())
            } else {
                err
            }
        })
    }

    /// Imports many participants in one transaction.
    ///
    /// Rows that fail validation or duplicate an existing identifier are
    /// skipped and counted.
    pub fn import_participants(
        &mut self,
        rows: Vec<ParticipantInput>,
        created_at: DateTime<Utc>,
    ) -> Result<ImportSummary, DbError> {
        let mut summary = ImportSummary::default();
        let tx = self.conn.transaction()?;
        for row in rows {
            let Ok(participant) = Participant::try_from(row) else {
                summary.skipped += 1;
                continue;
            };
            match insert_participant(&tx, &participant, created_at) {
                Ok(()) => summary.added += 1,
                Err(err) if err.is_unique_violation() => summary.skipped += 1,
                Err(err) => return Err(err),
            }
        }
        tx.commit()?;
        debug!(added = summary.added, skipped = summary.skipped, "participants imported");
        Ok(summary)
    }

    /// Lists participants ordered by identifier.
    ///
    /// `search` matches identifier or name, case-insensitively.
    pub fn list_participants(&self, search: Option<&str>) -> Result<Vec<Participant>, DbError> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()));
        let mut stmt = self.conn.prepare(
            "
            SELECT participant_id, name, department, year
            FROM participants
            WHERE ?1 IS NULL OR lower(participant_id) LIKE ?1 OR lower(name) LIKE ?1
            ORDER BY participant_id ASC
            ",
        )?;
        let rows = stmt.query_map([pattern], ParticipantRow::from_row)?;
        let mut participants = Vec::new();
        for row in rows {
            participants.push(row?.into_participant()?);
        }
        Ok(participants)
    }

    pub fn participant(&self, id: &ParticipantId) -> Result<Option<Participant>, DbError> {
        self.conn
            .query_row(
                "SELECT participant_id, name, department, year FROM participants WHERE participant_id = ?1",
                [id.as_str()],
                ParticipantRow::from_row,
            )
            .optional()?
            .map(ParticipantRow::into_participant)
            .transpose()
    }

    /// Deletes a participant and, by cascade, their sessions.
    pub fn delete_participant(&self, id: &ParticipantId) -> Result<bool, DbError> {
        let deleted = self.conn.execute(
            "DELETE FROM participants WHERE participant_id = ?1",
            [id.as_str()],
        )?;
        Ok(deleted > 0)
    }

    // Sessions

    pub fn session(
        &self,
        participant_id: &ParticipantId,
        event_id: EventId,
    ) -> Result<Option<AttendanceSession>, DbError> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM attendance_sessions
                     WHERE participant_id = ?1 AND event_id = ?2"
                ),
                params![participant_id.as_str(), event_id.get()],
                SessionRow::from_row,
            )
            .optional()?
            .map(SessionRow::into_session)
            .transpose()
    }

    pub fn session_by_id(&self, id: SessionId) -> Result<Option<AttendanceSession>, DbError> {
        self.conn
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM attendance_sessions WHERE id = ?1"),
                [id.get()],
                SessionRow::from_row,
            )
            .optional()?
            .map(SessionRow::into_session)
            .transpose()
    }

    /// Lists an event's sessions in check-in order.
    pub fn event_sessions(&self, event_id: EventId) -> Result<Vec<AttendanceSession>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM attendance_sessions
             WHERE event_id = ?1
             ORDER BY check_in_time ASC, id ASC"
        ))?;
        let rows = stmt.query_map([event_id.get()], SessionRow::from_row)?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?.into_session()?);
        }
        Ok(sessions)
    }

    /// Inserts a pending session while its event is active. Fails with a
    /// unique violation if the pair already has one, and with
    /// [`DbError::EventClosed`] if the event is inactive or gone.
    pub fn insert_session(&self, session: &NewSession) -> Result<AttendanceSession, DbError> {
        let inserted = self.conn.execute(
            "
            INSERT INTO attendance_sessions (participant_id, event_id, check_in_time, status)
            SELECT ?1, ?2, ?3, ?4
            WHERE EXISTS (SELECT 1 FROM events WHERE id = ?2 AND active = 1)
            ",
            params![
                session.participant_id.as_str(),
                session.event_id.get(),
                format_timestamp(session.check_in_time),
                AttendanceStatus::Pending.as_str(),
            ],
        )?;
        if inserted == 0 {
            return Err(DbError::EventClosed(session.event_id));
        }
        Ok(AttendanceSession {
            id: SessionId::new(self.conn.last_insert_rowid())?,
            participant_id: session.participant_id.clone(),
            event_id: session.event_id,
            check_in_time: session.check_in_time,
            check_out_time: None,
            duration_minutes: None,
            status: AttendanceStatus::Pending,
        })
    }

    /// Writes `next` only if the stored row still has `previous`'s status
    /// and checkout time and its event is still active. Returns whether the
    /// row was written.
    pub fn update_session(
        &self,
        previous: &AttendanceSession,
        next: &AttendanceSession,
    ) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "
            UPDATE attendance_sessions
            SET check_out_time = ?1, duration_minutes = ?2, status = ?3
            WHERE id = ?4 AND status = ?5 AND check_out_time IS ?6
              AND EXISTS (
                  SELECT 1 FROM events
                  WHERE events.id = attendance_sessions.event_id AND events.active = 1
              )
            ",
            params![
                next.check_out_time.map(format_timestamp),
                next.duration_minutes,
                next.status.as_str(),
                previous.id.get(),
                previous.status.as_str(),
                previous.check_out_time.map(format_timestamp),
            ],
        )?;
        Ok(changed == 1)
    }

    /// Marks the event's pending sessions absent and deactivates it, in one
    /// transaction. Returns the number of sessions changed.
    pub fn finalize_event(&mut self, event_id: EventId) -> Result<usize, DbError> {
        let tx = self.conn.transaction()?;
        let finalized = tx.execute(
            "
            UPDATE attendance_sessions
            SET status = 'ABSENT'
            WHERE event_id = ?1 AND status = 'PENDING'
            ",
            [event_id.get()],
        )?;
        tx.execute("UPDATE events SET active = 0 WHERE id = ?1", [event_id.get()])?;
        tx.commit()?;
        Ok(finalized)
    }

    /// Forces a session's status. Overriding to `PENDING` clears the
    /// checkout. Returns `None` if the session does not exist.
    pub fn override_status(
        &self,
        id: SessionId,
        status: AttendanceStatus,
    ) -> Result<Option<AttendanceSession>, DbError> {
        let Some(session) = self.session_by_id(id)? else {
            return Ok(None);
        };
        let updated = session.overridden(status);
        self.conn.execute(
            "
            UPDATE attendance_sessions
            SET check_out_time = ?2, duration_minutes = ?3, status = ?4
            WHERE id = ?1
            ",
            params![
                id.get(),
                updated.check_out_time.map(format_timestamp),
                updated.duration_minutes,
                updated.status.as_str(),
            ],
        )?;
        info!(session_id = %id, from = %session.status, to = %status, "status overridden");
        Ok(Some(updated))
    }

    /// Sessions joined with participant details, most recent check-in first.
    pub fn roster(&self, event_id: EventId) -> Result<Vec<RosterEntry>, DbError> {
        self.roster_ordered(event_id, "s.check_in_time DESC, s.id DESC")
    }

    /// Sessions joined with participant details, ordered by identifier.
    pub fn export_rows(&self, event_id: EventId) -> Result<Vec<RosterEntry>, DbError> {
        self.roster_ordered(event_id, "s.participant_id ASC")
    }

    fn roster_ordered(&self, event_id: EventId, order_by: &str) -> Result<Vec<RosterEntry>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "
            SELECT s.id, s.participant_id, s.event_id, s.check_in_time, s.check_out_time,
                   s.duration_minutes, s.status, p.name, p.department, p.year
            FROM attendance_sessions s
            JOIN participants p ON p.participant_id = s.participant_id
            WHERE s.event_id = ?1
            ORDER BY {order_by}
            "
        ))?;
        let rows = stmt.query_map([event_id.get()], |row| {
            Ok((
                SessionRow::from_row(row)?,
                ParticipantRow {
                    participant_id: row.get(1)?,
                    name: row.get(7)?,
                    department: row.get(8)?,
                    year: row.get(9)?,
                },
            ))
        })?;
        let mut entries = Vec::new();
        for row in rows {
            let (session, participant) = row?;
            entries.push(RosterEntry::new(
                session.into_session()?,
                &participant.into_participant()?,
            ));
        }
        Ok(entries)
    }
}

fn insert_participant(
    conn: &Connection,
    participant: &Participant,
    created_at: DateTime<Utc>,
) -> Result<(), DbError> {
    conn.execute(
        "
        INSERT INTO participants (participant_id, name, department, year, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ",
        params![
            participant.participant_id.as_str(),
            participant.name,
            participant.department,
            participant.year,
            format_timestamp(created_at),
        ],
    )?;
    Ok(())
}

const EVENT_COLUMNS: &str = "id, title, description, event_date, start_time, end_time, \
     duration_minutes, required_presence_percent, session_token, active, created_at";

const SESSION_COLUMNS: &str =
    "id, participant_id, event_id, check_in_time, check_out_time, duration_minutes, status";

struct EventRow {
    id: i64,
    title: String,
    description: Option<String>,
    event_date: String,
    start_time: String,
    end_time: String,
    duration_minutes: u32,
    required_presence_percent: f64,
    session_token: String,
    active: bool,
    created_at: String,
}

impl EventRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            event_date: row.get(3)?,
            start_time: row.get(4)?,
            end_time: row.get(5)?,
            duration_minutes: row.get(6)?,
            required_presence_percent: row.get(7)?,
            session_token: row.get(8)?,
            active: row.get(9)?,
            created_at: row.get(10)?,
        })
    }

    fn into_event(self) -> Result<Event, DbError> {
        Ok(Event {
            id: EventId::new(self.id)?,
            title: self.title,
            description: self.description,
            event_date: parse_date(&self.event_date)?,
            start_time: parse_timestamp("start_time", &self.start_time)?,
            end_time: parse_timestamp("end_time", &self.end_time)?,
            duration_minutes: self.duration_minutes,
            required_presence_percent: PresencePercent::new(self.required_presence_percent)?,
            session_token: self.session_token,
            active: self.active,
            created_at: parse_timestamp("created_at", &self.created_at)?,
        })
    }
}

struct ParticipantRow {
    participant_id: String,
    name: String,
    department: Option<String>,
    year: Option<u16>,
}

impl ParticipantRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            participant_id: row.get(0)?,
            name: row.get(1)?,
            department: row.get(2)?,
            year: row.get(3)?,
        })
    }

    fn into_participant(self) -> Result<Participant, DbError> {
        Ok(Participant::new(
            &self.participant_id,
            &self.name,
            self.department,
            self.year,
        )?)
    }
}

struct SessionRow {
    id: i64,
    participant_id: String,
    event_id: i64,
    check_in_time: String,
    check_out_time: Option<String>,
    duration_minutes: Option<f64>,
    status: String,
}

impl SessionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            participant_id: row.get(1)?,
            event_id: row.get(2)?,
            check_in_time: row.get(3)?,
            check_out_time: row.get(4)?,
            duration_minutes: row.get(5)?,
            status: row.get(6)?,
        })
    }

    fn into_session(self) -> Result<AttendanceSession, DbError> {
        Ok(AttendanceSession {
            id: SessionId::new(self.id)?,
            participant_id: ParticipantId::new(&self.participant_id)?,
            event_id: EventId::new(self.event_id)?,
            check_in_time: parse_timestamp("check_in_time", &self.check_in_time)?,
            check_out_time: self
                .check_out_time
                .as_deref()
                .map(|value| parse_timestamp("check_out_time", value))
                .transpose()?,
            duration_minutes: self.duration_minutes,
            status: self.status.parse()?,
        })
    }
}

fn parse_timestamp(column: &'static str, value: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            column,
            value: value.to_string(),
            source,
        })
}

fn parse_date(value: &str) -> Result<NaiveDate, DbError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|source| DbError::TimestampParse {
        column: "event_date",
        value: value.to_string(),
        source,
    })
}

/// Formats a timestamp the way every TEXT time column stores it.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
