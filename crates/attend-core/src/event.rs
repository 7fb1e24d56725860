//! Timed events and their attendance policy.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EventId, PresencePercent, ValidationError};

/// A scheduled event that participants check in and out of.
///
/// Once finalized (`active == false`) an event accepts no further
/// observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub event_date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Scheduled length of the event in minutes.
    pub duration_minutes: u32,
    /// Share of `duration_minutes` a participant must stay to be present.
    #[serde(alias = "min_attendance_percent")]
    pub required_presence_percent: PresencePercent,
    /// Opaque token handed to scanner clients for this event.
    pub session_token: String,
    #[serde(alias = "is_active")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Minutes a participant must stay to be graded present.
    #[must_use]
    pub fn required_minutes(&self) -> f64 {
        f64::from(self.duration_minutes) * self.required_presence_percent.value() / 100.0
    }
}

/// Input for creating an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub event_date: NaiveDate,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: u32,
    #[serde(default, alias = "min_attendance_percent")]
    pub required_presence_percent: Option<PresencePercent>,
}

impl NewEvent {
    /// Checks the fields that the storage layer cannot.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::Empty { field: "title" });
        }
        if self.duration_minutes == 0 {
            return Err(ValidationError::NotPositive {
                field: "duration_minutes",
                value: 0,
            });
        }
        Ok(())
    }
}

/// Partial update of an event; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub event_date: Option<NaiveDate>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default, alias = "min_attendance_percent")]
    pub required_presence_percent: Option<PresencePercent>,
    #[serde(default, alias = "is_active")]
    pub active: Option<bool>,
}

impl EventUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ValidationError::Empty { field: "title" });
        }
        if self.duration_minutes == Some(0) {
            return Err(ValidationError::NotPositive {
                field: "duration_minutes",
                value: 0,
            });
        }
        Ok(())
    }

    /// Applies the update to an in-memory copy of the event.
    pub fn apply(&self, event: &mut Event) {
        if let Some(title) = &self.title {
            event.title.clone_from(title);
        }
        if self.description.is_some() {
            event.description.clone_from(&self.description);
        }
        if let Some(date) = self.event_date {
            event.event_date = date;
        }
        if let Some(start) = self.start_time {
            event.start_time = start;
        }
        if let Some(end) = self.end_time {
            event.end_time = end;
        }
        if let Some(minutes) = self.duration_minutes {
            event.duration_minutes = minutes;
        }
        if let Some(percent) = self.required_presence_percent {
            event.required_presence_percent = percent;
        }
        if let Some(active) = self.active {
            event.active = active;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{event, timestamp};
    use super::*;

    #[test]
    #[expect(clippy::float_cmp, reason = "exact arithmetic on small integers")]
    fn required_minutes_applies_percent() {
        assert_eq!(event(1).required_minutes(), 90.0);
    }

    #[test]
    fn new_event_rejects_zero_duration() {
        let input = NewEvent {
            title: "Talk".to_string(),
            description: None,
            event_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            start_time: timestamp("2025-03-01T09:00:00Z"),
            end_time: timestamp("2025-03-01T10:00:00Z"),
            duration_minutes: 0,
            required_presence_percent: None,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn new_event_accepts_legacy_percent_name() {
        let json = r#"{
            "title": "Talk",
            "event_date": "2025-03-01",
            "start_time": "2025-03-01T09:00:00Z",
            "end_time": "2025-03-01T10:00:00Z",
            "duration_minutes": 60,
            "min_attendance_percent": 50.0
        }"#;
        let input: NewEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            input.required_presence_percent,
            Some(PresencePercent::new(50.0).unwrap())
        );
    }

    #[test]
    fn update_applies_only_present_fields() {
        let mut target = event(3);
        let update = EventUpdate {
            title: Some("Renamed".to_string()),
            active: Some(false),
            ..EventUpdate::default()
        };
        update.apply(&mut target);
        assert_eq!(target.title, "Renamed");
        assert!(!target.active);
        assert_eq!(target.duration_minutes, 120);
    }

    #[test]
    fn update_rejects_blank_title() {
        let update = EventUpdate {
            title: Some("  ".to_string()),
            ..EventUpdate::default()
        };
        assert!(update.validate().is_err());
    }
}
