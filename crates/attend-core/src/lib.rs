//! Core domain logic for event attendance.
//!
//! This crate contains the fundamental types and logic for:
//! - Decisions: classifying a badge scan as check-in, checkout or noise
//! - The engine: applying decisions to a store one participant at a time
//! - Finalization: resolving sessions left open when an event ends

pub mod clock;
mod decision;
mod engine;
mod error;
pub mod event;
mod locks;
pub mod outcome;
pub mod participant;
pub mod policy;
pub mod session;
pub mod stats;
pub mod status;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use decision::{BlockReason, Checkout, Decision, decide, minutes};
pub use engine::AttendanceEngine;
pub use error::{AttendanceError, StoreError};
pub use event::{Event, EventUpdate, NewEvent};
pub use outcome::{Action, Outcome, ScanRequest, ScanResponse};
pub use participant::{Participant, ParticipantInput};
pub use policy::DecisionPolicy;
pub use session::{AttendanceSession, NewSession};
pub use stats::{EventStats, FinalizeSummary, RosterEntry};
pub use status::AttendanceStatus;
pub use store::{AttendanceStore, MemoryStore, UnavailableStore};
pub use types::{EventId, ParticipantId, PresencePercent, SessionId, ValidationError};
