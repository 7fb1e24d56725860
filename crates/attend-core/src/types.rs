//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A numeric identifier was zero or negative.
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: i64 },

    /// The required presence percentage was outside (0, 100].
    #[error("required presence percent must be in (0, 100], got {value}")]
    PercentOutOfRange { value: f64 },

    /// Invalid attendance status value.
    #[error("invalid attendance status: {value}")]
    InvalidStatus { value: String },
}

/// A normalized participant identifier.
///
/// Identifiers are case-insensitive and whitespace-trimmed: the raw scan
/// text is trimmed and uppercased once, here, and every comparison or
/// storage key uses the normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Normalizes and validates a raw identifier.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
        let normalized = raw.as_ref().trim().to_uppercase();
        if normalized.is_empty() {
            return Err(ValidationError::Empty {
                field: "participant ID",
            });
        }
        Ok(Self(normalized))
    }

    /// Returns the normalized identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ParticipantId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ParticipantId> for String {
    fn from(id: ParticipantId) -> Self {
        id.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ParticipantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Generates a positive integer ID newtype with common trait implementations.
macro_rules! define_row_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "i64", into = "i64")]
        pub struct $name(i64);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: i64) -> Result<Self, ValidationError> {
                if id <= 0 {
                    return Err(ValidationError::NotPositive {
                        field: $field_name,
                        value: id,
                    });
                }
                Ok(Self(id))
            }

            /// Returns the raw row ID.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl TryFrom<i64> for $name {
            type Error = ValidationError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_row_id!(
    /// A validated event identifier.
    EventId, "event ID"
);

define_row_id!(
    /// A validated attendance session identifier.
    SessionId, "session ID"
);

/// A required presence percentage in the range (0, 100].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct PresencePercent(f64);

impl PresencePercent {
    /// The percentage used when an event does not specify one.
    pub const DEFAULT: Self = Self(75.0);

    /// Creates a percentage after validation.
    ///
    /// Returns an error if the value is NaN or outside (0, 100].
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if value.is_nan() || value <= 0.0 || value > 100.0 {
            return Err(ValidationError::PercentOutOfRange { value });
        }
        Ok(Self(value))
    }

    /// Returns the inner value.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl Default for PresencePercent {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<f64> for PresencePercent {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PresencePercent> for f64 {
    fn from(percent: PresencePercent) -> Self {
        percent.0
    }
}

impl fmt::Display for PresencePercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== ParticipantId Tests ==========

    #[test]
    fn participant_id_trims_and_uppercases() {
        let id = ParticipantId::new("  a1b2 \n").unwrap();
        assert_eq!(id.as_str(), "A1B2");
    }

    #[test]
    fn participant_id_comparison_is_case_insensitive() {
        assert_eq!(
            ParticipantId::new("cs21b001").unwrap(),
            ParticipantId::new("CS21B001 ").unwrap()
        );
    }

    #[test]
    fn participant_id_rejects_blank() {
        assert_eq!(
            ParticipantId::new("   "),
            Err(ValidationError::Empty {
                field: "participant ID"
            })
        );
    }

    #[test]
    fn participant_id_deserializes_normalized() {
        let id: ParticipantId = serde_json::from_str(r#"" zz9 ""#).unwrap();
        assert_eq!(id.as_str(), "ZZ9");
        assert!(serde_json::from_str::<ParticipantId>(r#""""#).is_err());
    }

    // ========== Row ID Tests ==========

    #[test]
    fn event_id_rejects_non_positive() {
        assert!(EventId::new(0).is_err());
        assert!(EventId::new(-4).is_err());
        assert_eq!(EventId::new(7).unwrap().get(), 7);
    }

    #[test]
    fn session_id_rejects_zero_in_json() {
        assert!(serde_json::from_str::<SessionId>("0").is_err());
        let id: SessionId = serde_json::from_str("12").unwrap();
        assert_eq!(i64::from(id), 12);
    }

    // ========== PresencePercent Tests ==========

    #[test]
    fn presence_percent_validates_bounds() {
        assert!(PresencePercent::new(0.0).is_err());
        assert!(PresencePercent::new(-5.0).is_err());
        assert!(PresencePercent::new(100.5).is_err());
        assert!(PresencePercent::new(f64::NAN).is_err());
        assert!(PresencePercent::new(0.1).is_ok());
        assert!(PresencePercent::new(100.0).is_ok());
    }

    #[test]
    #[expect(
        clippy::float_cmp,
        reason = "exact equality intended for default value"
    )]
    fn presence_percent_default_is_seventy_five() {
        assert_eq!(PresencePercent::default().value(), 75.0);
    }
}
