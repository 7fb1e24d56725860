//! Timing policy for observation decisions.

use chrono::Duration;

/// Anti-abuse timing rules applied to repeated observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionPolicy {
    /// A repeat scan closer than this to the session's last action is
    /// treated as noise from the same badge, not a new action.
    /// Default: 10 seconds.
    pub debounce_window: Duration,

    /// A checkout attempted less than this long after check-in is refused
    /// with a warning instead of grading the session.
    /// Default: 1 minute.
    pub min_checkout: Duration,
}

impl DecisionPolicy {
    /// Builds a policy from whole seconds, as found in configuration files.
    pub fn from_secs(debounce_window_secs: u32, min_checkout_secs: u32) -> Self {
        Self {
            debounce_window: Duration::seconds(i64::from(debounce_window_secs)),
            min_checkout: Duration::seconds(i64::from(min_checkout_secs)),
        }
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            debounce_window: Duration::seconds(10),
            min_checkout: Duration::minutes(1),
        }
    }
}
