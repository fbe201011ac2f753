//! Per-key limit entry.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Attempt count and lock/clear deadlines for one key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LimitEntry {
    /// Events recorded since the entry was created or last reset
    pub times: u32,
    /// The key is locked until this instant
    pub limit_until: Option<DateTime<Utc>>,
    /// The count resets once this instant has passed
    pub clear_until: Option<DateTime<Utc>>,
}

impl LimitEntry {
    /// Whether the clear window has passed as of `now`.
    ///
    /// Entries without a clear window never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.clear_until, Some(at) if at < now)
    }

    /// Forget everything, as if the entry had just been created.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Set both deadlines from policy windows relative to `now`.
    ///
    /// Non-positive windows clear the corresponding deadline.
    pub fn apply_windows(&mut self, now: DateTime<Utc>, lock_in: Duration, clear_in: Duration) {
        self.limit_until = deadline(now, lock_in);
        self.clear_until = deadline(now, clear_in);
    }

    /// Remaining lock and clear time as of `now`, clamped at zero.
    pub fn status(&self, now: DateTime<Utc>) -> LimitStatus {
        LimitStatus {
            lock_in: remaining(self.limit_until, now),
            clear_in: remaining(self.clear_until, now),
        }
    }
}

fn deadline(now: DateTime<Utc>, window: Duration) -> Option<DateTime<Utc>> {
    if window <= Duration::zero() {
        return None;
    }
    Some(now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC))
}

fn remaining(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
    deadline
        .map(|at| at.signed_duration_since(now))
        .filter(|left| *left > Duration::zero())
        .unwrap_or_else(Duration::zero)
}

/// Lock and clear windows reported to callers.
///
/// A positive `lock_in` means the guarded action must be refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimitStatus {
    /// Time until the lock lifts
    #[serde(serialize_with = "as_secs")]
    pub lock_in: Duration,
    /// Time until the count resets
    #[serde(serialize_with = "as_secs")]
    pub clear_in: Duration,
}

impl LimitStatus {
    /// No lock, no clear window.
    pub fn none() -> Self {
        Self {
            lock_in: Duration::zero(),
            clear_in: Duration::zero(),
        }
    }

    /// Build a status from raw policy output, mapping negative windows to zero.
    pub fn from_policy(lock_in: Duration, clear_in: Duration) -> Self {
        Self {
            lock_in: lock_in.max(Duration::zero()),
            clear_in: clear_in.max(Duration::zero()),
        }
    }

    /// Whether the guarded action must be refused right now.
    pub fn is_locked(&self) -> bool {
        self.lock_in > Duration::zero()
    }
}

impl Default for LimitStatus {
    fn default() -> Self {
        Self::none()
    }
}

fn as_secs<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(value.num_seconds())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_without_clear_window_never_expires() {
        let now = Utc::now();
        let entry = LimitEntry {
            times: 9,
            limit_until: Some(now - Duration::hours(1)),
            clear_until: None,
        };
        assert!(!entry.is_expired(now + Duration::days(365)));
    }

    #[test]
    fn test_entry_expires_strictly_after_clear_until() {
        let now = Utc::now();
        let entry = LimitEntry {
            times: 1,
            limit_until: None,
            clear_until: Some(now),
        };
        assert!(!entry.is_expired(now));
        assert!(entry.is_expired(now + Duration::milliseconds(1)));
    }

    #[test]
    fn test_apply_windows_clears_non_positive_windows() {
        let now = Utc::now();
        let mut entry = LimitEntry {
            times: 3,
            limit_until: Some(now),
            clear_until: Some(now),
        };

        entry.apply_windows(now, Duration::zero(), Duration::seconds(-5));

        assert_eq!(entry.limit_until, None);
        assert_eq!(entry.clear_until, None);
    }

    #[test]
    fn test_apply_windows_keeps_windows_independent() {
        let now = Utc::now();
        let mut entry = LimitEntry::default();

        entry.apply_windows(now, Duration::minutes(10), Duration::minutes(1));

        assert_eq!(entry.limit_until, Some(now + Duration::minutes(10)));
        assert_eq!(entry.clear_until, Some(now + Duration::minutes(1)));
    }

    #[test]
    fn test_apply_windows_saturates_far_deadlines() {
        let now = Utc::now();
        let mut entry = LimitEntry::default();

        entry.apply_windows(now, Duration::MAX, Duration::zero());

        assert_eq!(entry.limit_until, Some(DateTime::<Utc>::MAX_UTC));
    }

    #[test]
    fn test_status_clamps_passed_deadlines() {
        let now = Utc::now();
        let entry = LimitEntry {
            times: 6,
            limit_until: Some(now + Duration::minutes(1)),
            clear_until: Some(now + Duration::minutes(2)),
        };

        let status = entry.status(now + Duration::seconds(90));
        assert_eq!(status.lock_in, Duration::zero());
        assert_eq!(status.clear_in, Duration::seconds(30));
        assert!(!status.is_locked());
    }

    #[test]
    fn test_status_from_policy_normalizes_negatives() {
        let status = LimitStatus::from_policy(Duration::seconds(-1), Duration::seconds(7));
        assert_eq!(status.lock_in, Duration::zero());
        assert_eq!(status.clear_in, Duration::seconds(7));
    }

    #[test]
    fn test_status_serializes_as_seconds() {
        let status = LimitStatus::from_policy(Duration::minutes(1), Duration::minutes(2));
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, r#"{"lock_in":60,"clear_in":120}"#);
    }
}
