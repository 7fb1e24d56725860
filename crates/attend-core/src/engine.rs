//! Applies decisions to a store with per-key serialization.
//!
//! Observations for the same (participant, event) pair run one at a time;
//! different pairs run in parallel. Each observation holds its event's lock
//! shared, and finalization holds it exclusively, so an observation never
//! interleaves with the sweep that closes its event.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::decision::{Decision, decide};
use crate::error::{AttendanceError, StoreError};
use crate::event::Event;
use crate::locks::LockTable;
use crate::outcome::Outcome;
use crate::participant::Participant;
use crate::policy::DecisionPolicy;
use crate::session::NewSession;
use crate::stats::{EventStats, FinalizeSummary};
use crate::store::AttendanceStore;
use crate::types::{EventId, ParticipantId};

/// How many times a conflicting write is re-read and re-decided.
const MAX_CONFLICT_RETRIES: usize = 5;

type PairKey = (ParticipantId, EventId);

pub struct AttendanceEngine<S> {
    store: S,
    clock: Arc<dyn Clock>,
    policy: DecisionPolicy,
    event_locks: LockTable<EventId, RwLock<()>>,
    pair_locks: LockTable<PairKey, Mutex<()>>,
}

impl<S: AttendanceStore> AttendanceEngine<S> {
    /// Creates an engine reading the system clock with the default policy.
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), DecisionPolicy::default())
    }

    pub fn with_clock(store: S, clock: Arc<dyn Clock>, policy: DecisionPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
            event_locks: LockTable::new(),
            pair_locks: LockTable::new(),
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Records an observation at the current clock time.
    pub fn record_observation(
        &self,
        event_id: EventId,
        raw_identifier: &str,
    ) -> Result<Outcome, AttendanceError> {
        self.record_observation_at(event_id, raw_identifier, self.clock.now())
    }

    /// Records an observation that happened at `now`.
    pub fn record_observation_at(
        &self,
        event_id: EventId,
        raw_identifier: &str,
        now: DateTime<Utc>,
    ) -> Result<Outcome, AttendanceError> {
        let participant_id = ParticipantId::new(raw_identifier).map_err(|err| {
            warn!(event_id = %event_id, "rejected observation: {err}");
            AttendanceError::InvalidInput(err.to_string())
        })?;

        self.event_locks.with(&event_id, |event_lock| -> Result<Outcome, AttendanceError> {
            let _shared = event_lock.read().unwrap_or_else(PoisonError::into_inner);

            let event = self.active_event(event_id)?;
            let participant = self
                .store
                .participant(&participant_id)?
                .ok_or_else(|| AttendanceError::ParticipantUnknown(participant_id.clone()))?;

            let key = (participant_id.clone(), event_id);
            self.pair_locks.with(&key, |pair_lock| {
                let _exclusive = pair_lock.lock().unwrap_or_else(PoisonError::into_inner);
                self.apply_with_retry(event, participant, now)
            })
        })
    }

    fn active_event(&self, event_id: EventId) -> Result<Event, AttendanceError> {
        let event = self
            .store
            .event(event_id)?
            .ok_or(AttendanceError::EventNotFound(event_id))?;
        if !event.active {
            return Err(AttendanceError::EventInactive(event_id));
        }
        Ok(event)
    }

    /// Applies the observation, re-reading the event and session after each
    /// conflict. Another connection may have closed or removed the event.
    fn apply_with_retry(
        &self,
        mut event: Event,
        participant: Participant,
        now: DateTime<Utc>,
    ) -> Result<Outcome, AttendanceError> {
        let mut attempt = 0;
        loop {
            match self.apply_once(&event, &participant, now) {
                Err(StoreError::Conflict(reason)) if attempt < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    warn!(
                        participant_id = %participant.participant_id,
                        event_id = %event.id,
                        attempt,
                        "write conflict, re-reading event and session: {reason}"
                    );
                    event = self.active_event(event.id)?;
                }
                Ok(outcome) => return Ok(outcome),
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn apply_once(
        &self,
        event: &Event,
        participant: &Participant,
        now: DateTime<Utc>,
    ) -> Result<Outcome, StoreError> {
        let existing = self.store.session(&participant.participant_id, event.id)?;
        let decision = decide(&self.policy, event, existing.as_ref(), now);
        debug!(
            participant_id = %participant.participant_id,
            event_id = %event.id,
            ?decision,
            "observation decided"
        );

        let participant = participant.clone();
        match (decision, existing) {
            (Decision::CheckIn, _) => {
                let session = self.store.insert_session(NewSession {
                    participant_id: participant.participant_id.clone(),
                    event_id: event.id,
                    check_in_time: now,
                })?;
                Ok(Outcome::CheckIn {
                    participant,
                    session,
                })
            }
            (Decision::CheckOut(checkout), Some(session)) => {
                let graded = session.checked_out(
                    checkout.check_out_time,
                    checkout.duration_minutes,
                    checkout.status,
                );
                self.store.update_session(&session, &graded)?;
                Ok(Outcome::CheckOut {
                    participant,
                    session: graded,
                    required_minutes: checkout.required_minutes,
                })
            }
            (Decision::DuplicateBlocked(reason), Some(session)) => Ok(Outcome::DuplicateBlocked {
                participant,
                session,
                reason,
            }),
            (Decision::EarlyCheckoutWarning { elapsed_minutes }, Some(session)) => {
                Ok(Outcome::EarlyCheckoutWarning {
                    participant,
                    session,
                    elapsed_minutes,
                })
            }
            (decision, None) => Err(StoreError::Corrupt(format!(
                "{decision:?} decided without a session"
            ))),
        }
    }

    /// Closes an event: pending sessions become absent and the event stops
    /// accepting observations. Calling it again changes nothing.
    pub fn finalize_event(&self, event_id: EventId) -> Result<FinalizeSummary, AttendanceError> {
        self.event_locks.with(&event_id, |event_lock| -> Result<_, AttendanceError> {
            let _exclusive = event_lock.write().unwrap_or_else(PoisonError::into_inner);

            if self.store.event(event_id)?.is_none() {
                return Err(AttendanceError::EventNotFound(event_id));
            }
            let finalized_count = self.store.finalize_event(event_id)?;
            info!(event_id = %event_id, finalized_count, "event finalized");
            Ok(FinalizeSummary {
                event_id,
                finalized_count,
            })
        })
    }

    pub fn event_stats(&self, event_id: EventId) -> Result<EventStats, AttendanceError> {
        let event = self
            .store
            .event(event_id)?
            .ok_or(AttendanceError::EventNotFound(event_id))?;
        let sessions = self.store.event_sessions(event_id)?;
        Ok(EventStats::tally(&event, &sessions))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::decision::BlockReason;
    use crate::event::fixtures::{event, timestamp};
    use crate::outcome::Action;
    use crate::session::AttendanceSession;
    use crate::status::AttendanceStatus;
    use crate::store::{MemoryStore, UnavailableStore};

    fn t0() -> DateTime<Utc> {
        timestamp("2025-03-01T09:00:00Z")
    }

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.add_event(event(1));
        for (id, name) in [("A1", "Alice"), ("B2", "Bob"), ("C3", "Carol")] {
            store.add_participant(Participant::new(id, name, None, None).unwrap());
        }
        store
    }

    fn engine() -> (AttendanceEngine<MemoryStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(t0()));
        let engine = AttendanceEngine::with_clock(
            seeded_store(),
            clock.clone(),
            DecisionPolicy::default(),
        );
        (engine, clock)
    }

    fn event_one() -> EventId {
        EventId::new(1).unwrap()
    }

    #[test]
    #[expect(clippy::float_cmp, reason = "exact minute values")]
    fn scenario_check_in_through_grading() {
        let (engine, clock) = engine();

        let first = engine.record_observation(event_one(), "a1").unwrap();
        assert_eq!(first.action(), Action::CheckIn);
        assert_eq!(first.session().status, AttendanceStatus::Pending);
        assert_eq!(first.session().check_in_time, t0());

        clock.advance(Duration::seconds(5));
        let blocked = engine.record_observation(event_one(), "A1").unwrap();
        assert!(matches!(
            blocked,
            Outcome::DuplicateBlocked {
                reason: BlockReason::Debounce { .. },
                ..
            }
        ));

        clock.set(t0() + Duration::seconds(30));
        let early = engine.record_observation(event_one(), "A1").unwrap();
        assert_eq!(early.action(), Action::EarlyCheckoutWarning);
        assert_eq!(early.session().status, AttendanceStatus::Pending);

        clock.set(t0() + Duration::minutes(95));
        let out = engine.record_observation(event_one(), "A1").unwrap();
        let Outcome::CheckOut {
            session,
            required_minutes,
            ..
        } = out
        else {
            panic!("expected checkout, got {out:?}");
        };
        assert_eq!(session.status, AttendanceStatus::Present);
        assert_eq!(session.duration_minutes, Some(95.0));
        assert_eq!(required_minutes, 90.0);

        clock.set(t0() + Duration::minutes(200));
        let again = engine.record_observation(event_one(), "A1").unwrap();
        assert!(matches!(
            again,
            Outcome::DuplicateBlocked {
                reason: BlockReason::AlreadyPresent,
                ..
            }
        ));
    }

    #[test]
    fn short_stay_is_absent() {
        let (engine, clock) = engine();
        engine.record_observation(event_one(), "B2").unwrap();
        clock.advance(Duration::minutes(50));
        let out = engine.record_observation(event_one(), "B2").unwrap();
        assert_eq!(out.action(), Action::CheckOut);
        assert_eq!(out.session().status, AttendanceStatus::Absent);
        assert_eq!(out.session().duration_minutes, Some(50.0));
    }

    #[test]
    fn explicit_timestamp_overrides_clock() {
        let (engine, _clock) = engine();
        let at = t0() + Duration::minutes(3);
        let out = engine.record_observation_at(event_one(), "C3", at).unwrap();
        assert_eq!(out.session().check_in_time, at);
    }

    #[test]
    fn validation_failures_are_distinct() {
        let (engine, _clock) = engine();
        assert!(matches!(
            engine.record_observation(event_one(), "   "),
            Err(AttendanceError::InvalidInput(_))
        ));
        assert_eq!(
            engine.record_observation(EventId::new(99).unwrap(), "A1"),
            Err(AttendanceError::EventNotFound(EventId::new(99).unwrap()))
        );
        assert_eq!(
            engine.record_observation(event_one(), "ZZZZ"),
            Err(AttendanceError::ParticipantUnknown(
                ParticipantId::new("ZZZZ").unwrap()
            ))
        );
        assert_eq!(engine.store().session_count(), 0);
    }

    #[test]
    fn validation_checks_run_in_order() {
        let (engine, _clock) = engine();
        let missing = EventId::new(99).unwrap();
        engine.finalize_event(event_one()).unwrap();

        assert!(matches!(
            engine.record_observation(missing, "  "),
            Err(AttendanceError::InvalidInput(_))
        ));
        assert_eq!(
            engine.record_observation(missing, "ZZZZ"),
            Err(AttendanceError::EventNotFound(missing))
        );
        assert_eq!(
            engine.record_observation(event_one(), "ZZZZ"),
            Err(AttendanceError::EventInactive(event_one()))
        );
    }

    /// Closes the event from outside the engine right before the first
    /// session write, the way a second process would.
    struct ClosesBeforeWrite {
        inner: MemoryStore,
        armed: std::sync::atomic::AtomicBool,
    }

    impl ClosesBeforeWrite {
        fn close_once(&self, event_id: EventId) -> Result<(), StoreError> {
            if self.armed.swap(false, std::sync::atomic::Ordering::SeqCst) {
                self.inner.finalize_event(event_id)?;
            }
            Ok(())
        }
    }

    impl AttendanceStore for ClosesBeforeWrite {
        fn event(&self, id: EventId) -> Result<Option<Event>, StoreError> {
            self.inner.event(id)
        }

        fn participant(&self, id: &ParticipantId) -> Result<Option<Participant>, StoreError> {
            self.inner.participant(id)
        }

        fn session(
            &self,
            participant_id: &ParticipantId,
            event_id: EventId,
        ) -> Result<Option<AttendanceSession>, StoreError> {
            self.inner.session(participant_id, event_id)
        }

        fn event_sessions(&self, event_id: EventId) -> Result<Vec<AttendanceSession>, StoreError> {
            self.inner.event_sessions(event_id)
        }

        fn insert_session(&self, session: NewSession) -> Result<AttendanceSession, StoreError> {
            self.close_once(session.event_id)?;
            self.inner.insert_session(session)
        }

        fn update_session(
            &self,
            previous: &AttendanceSession,
            next: &AttendanceSession,
        ) -> Result<(), StoreError> {
            self.close_once(previous.event_id)?;
            self.inner.update_session(previous, next)
        }

        fn finalize_event(&self, event_id: EventId) -> Result<usize, StoreError> {
            self.inner.finalize_event(event_id)
        }
    }

    #[test]
    fn check_in_racing_outside_finalize_is_rejected() {
        let store = ClosesBeforeWrite {
            inner: seeded_store(),
            armed: true.into(),
        };
        let engine = AttendanceEngine::with_clock(
            store,
            Arc::new(ManualClock::new(t0())),
            DecisionPolicy::default(),
        );

        assert_eq!(
            engine.record_observation(event_one(), "A1"),
            Err(AttendanceError::EventInactive(event_one()))
        );
        assert_eq!(engine.store().inner.session_count(), 0);
        assert_eq!(engine.finalize_event(event_one()).unwrap().finalized_count, 0);
    }

    #[test]
    fn finalized_event_rejects_observations() {
        let (engine, _clock) = engine();
        engine.record_observation(event_one(), "A1").unwrap();
        engine.record_observation(event_one(), "B2").unwrap();

        let summary = engine.finalize_event(event_one()).unwrap();
        assert_eq!(summary.finalized_count, 2);

        assert_eq!(
            engine.record_observation(event_one(), "C3"),
            Err(AttendanceError::EventInactive(event_one()))
        );
        assert_eq!(engine.finalize_event(event_one()).unwrap().finalized_count, 0);

        let stats = engine.event_stats(event_one()).unwrap();
        assert_eq!(stats.absent, 2);
        assert_eq!(stats.pending, 0);
        assert!(!stats.active);
    }

    #[test]
    fn finalize_leaves_graded_sessions_alone() {
        let (engine, clock) = engine();
        engine.record_observation(event_one(), "A1").unwrap();
        engine.record_observation(event_one(), "B2").unwrap();
        clock.advance(Duration::minutes(100));
        engine.record_observation(event_one(), "A1").unwrap();

        assert_eq!(engine.finalize_event(event_one()).unwrap().finalized_count, 1);
        let stats = engine.event_stats(event_one()).unwrap();
        assert_eq!(stats.present, 1);
        assert_eq!(stats.absent, 1);
        assert_eq!(stats.total_scans, 2);
    }

    #[test]
    fn finalize_unknown_event_fails() {
        let (engine, _clock) = engine();
        let missing = EventId::new(42).unwrap();
        assert_eq!(
            engine.finalize_event(missing),
            Err(AttendanceError::EventNotFound(missing))
        );
    }

    #[test]
    fn store_outage_is_retryable() {
        let engine = AttendanceEngine::new(UnavailableStore::new("disk full"));
        let err = engine.record_observation(event_one(), "A1").unwrap_err();
        assert!(err.is_retryable());
        assert!(engine.finalize_event(event_one()).unwrap_err().is_retryable());
    }

    #[test]
    fn concurrent_scans_create_one_session_per_pair() {
        let (engine, _clock) = engine();
        let outcomes = Mutex::new(Vec::new());
        std::thread::scope(|scope| {
            for i in 0..16 {
                let engine = &engine;
                let outcomes = &outcomes;
                scope.spawn(move || {
                    let id = ["A1", "b2", "C3"][i % 3];
                    let outcome = engine.record_observation(event_one(), id).unwrap();
                    outcomes.lock().unwrap().push(outcome.action());
                });
            }
        });

        assert_eq!(engine.store().session_count(), 3);
        let outcomes = outcomes.into_inner().unwrap();
        let check_ins = outcomes.iter().filter(|a| **a == Action::CheckIn).count();
        assert_eq!(check_ins, 3);
        assert!(
            outcomes
                .iter()
                .all(|a| matches!(a, Action::CheckIn | Action::DuplicateBlocked))
        );
    }

    #[test]
    fn concurrent_finalize_and_scans_leave_no_pending() {
        let (engine, clock) = engine();
        clock.advance(Duration::minutes(1));
        std::thread::scope(|scope| {
            for id in ["A1", "B2", "C3"] {
                let engine = &engine;
                scope.spawn(move || {
                    let _ = engine.record_observation(event_one(), id);
                });
            }
            scope.spawn(|| engine.finalize_event(event_one()).unwrap());
        });
        // Every scan either ran before finalize (and was swept to absent) or
        // after it (and was rejected).
        let stats = engine.event_stats(event_one()).unwrap();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.absent, stats.total_scans);
    }
}
