//! Attendance status as the single source of truth for status strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::ValidationError;

/// Resolution state of an attendance session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AttendanceStatus {
    /// Checked in, not yet resolved.
    #[default]
    Pending,
    /// Stayed at least the required number of minutes.
    Present,
    /// Left early, or never checked out before the event was finalized.
    Absent,
}

impl AttendanceStatus {
    /// Every status, in storage order.
    pub const ALL: [Self; 3] = [Self::Pending, Self::Present, Self::Absent];

    /// Returns the string representation for SQL storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Present => "PRESENT",
            Self::Absent => "ABSENT",
        }
    }

    /// Whether the session still awaits a checkout or finalization.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "PRESENT" => Ok(Self::Present),
            "ABSENT" => Ok(Self::Absent),
            _ => Err(ValidationError::InvalidStatus {
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_variants() {
        for status in AttendanceStatus::ALL {
            let parsed: AttendanceStatus = status.to_string().parse().expect("should parse");
            assert_eq!(parsed, status, "roundtrip failed for {status:?}");
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(
            "present".parse::<AttendanceStatus>().unwrap(),
            AttendanceStatus::Present
        );
        assert_eq!(
            " Absent ".parse::<AttendanceStatus>().unwrap(),
            AttendanceStatus::Absent
        );
    }

    #[test]
    fn unknown_status_errors() {
        let err = "LATE".parse::<AttendanceStatus>().unwrap_err();
        assert_eq!(err.to_string(), "invalid attendance status: LATE");
    }

    #[test]
    fn serializes_uppercase() {
        let json = serde_json::to_string(&AttendanceStatus::Pending).unwrap();
        assert_eq!(json, r#""PENDING""#);
    }
}
