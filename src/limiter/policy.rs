//! Escalation policies: how long to lock a key after N attempts.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Maps a cumulative attempt count to `(lock_in, clear_in)`.
///
/// Both durations are relative to the moment the attempt is recorded. A zero
/// or negative `lock_in` means the key is not locked; a zero or negative
/// `clear_in` means the count never expires on its own. Implementations are
/// expected to be non-decreasing in `times`, but the limiter does not check.
///
/// The policy is called while the limiter's lock is held, so it must be cheap
/// and must not block.
pub trait EscalationPolicy: Send + Sync {
    /// Compute the lock and clear windows for the `times`-th attempt.
    fn escalate(&self, times: u32) -> (Duration, Duration);
}

impl<F> EscalationPolicy for F
where
    F: Fn(u32) -> (Duration, Duration) + Send + Sync,
{
    fn escalate(&self, times: u32) -> (Duration, Duration) {
        self(times)
    }
}

/// Linear escalation after a number of free attempts.
///
/// For `times > free_attempts`, with `n = times - free_attempts`:
/// `lock = n * lock_step_secs` and `clear = n * clear_step_secs`, each capped
/// by its optional maximum. Attempts inside the free band get no lock and, if
/// `idle_reset_secs` is set, a clear window of that length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearEscalation {
    /// Attempts allowed before any lock is applied
    #[serde(default = "default_free_attempts")]
    pub free_attempts: u32,

    /// Lock added per attempt past the free band, in seconds
    #[serde(default = "default_lock_step")]
    pub lock_step_secs: u64,

    /// Clear window added per attempt past the free band, in seconds
    #[serde(default = "default_clear_step")]
    pub clear_step_secs: u64,

    /// Upper bound on the lock window
    #[serde(default)]
    pub max_lock_secs: Option<u64>,

    /// Upper bound on the clear window
    #[serde(default)]
    pub max_clear_secs: Option<u64>,

    /// Clear window for attempts inside the free band
    #[serde(default)]
    pub idle_reset_secs: Option<u64>,
}

fn default_free_attempts() -> u32 {
    5
}

fn default_lock_step() -> u64 {
    60
}

fn default_clear_step() -> u64 {
    120
}

impl Default for LinearEscalation {
    fn default() -> Self {
        Self {
            free_attempts: default_free_attempts(),
            lock_step_secs: default_lock_step(),
            clear_step_secs: default_clear_step(),
            max_lock_secs: None,
            max_clear_secs: None,
            idle_reset_secs: None,
        }
    }
}

impl LinearEscalation {
    /// Create a policy with the given free band and per-step windows.
    pub fn new(free_attempts: u32, lock_step: Duration, clear_step: Duration) -> Self {
        Self {
            free_attempts,
            lock_step_secs: lock_step.num_seconds().max(0) as u64,
            clear_step_secs: clear_step.num_seconds().max(0) as u64,
            ..Self::default()
        }
    }

    /// Cap the lock and clear windows.
    pub fn with_caps(mut self, max_lock: Duration, max_clear: Duration) -> Self {
        self.max_lock_secs = Some(max_lock.num_seconds().max(0) as u64);
        self.max_clear_secs = Some(max_clear.num_seconds().max(0) as u64);
        self
    }

    /// Give attempts inside the free band a clear window.
    pub fn with_idle_reset(mut self, window: Duration) -> Self {
        self.idle_reset_secs = Some(window.num_seconds().max(0) as u64);
        self
    }
}

/// `steps * step_secs`, capped, as a duration. Saturates instead of overflowing.
fn scaled(steps: u32, step_secs: u64, cap: Option<u64>) -> Duration {
    let mut secs = step_secs.saturating_mul(u64::from(steps));
    if let Some(cap) = cap {
        secs = secs.min(cap);
    }
    let secs = i64::try_from(secs).unwrap_or(i64::MAX);
    Duration::try_seconds(secs).unwrap_or(Duration::MAX)
}

impl EscalationPolicy for LinearEscalation {
    fn escalate(&self, times: u32) -> (Duration, Duration) {
        if times <= self.free_attempts {
            let clear = self
                .idle_reset_secs
                .map(|secs| scaled(1, secs, None))
                .unwrap_or_else(Duration::zero);
            return (Duration::zero(), clear);
        }

        let steps = times - self.free_attempts;
        (
            scaled(steps, self.lock_step_secs, self.max_lock_secs),
            scaled(steps, self.clear_step_secs, self.max_clear_secs),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_a_policy() {
        let policy = |times: u32| (Duration::seconds(i64::from(times)), Duration::zero());
        assert_eq!(policy.escalate(4), (Duration::seconds(4), Duration::zero()));
    }

    #[test]
    fn test_linear_free_band() {
        let policy = LinearEscalation::default();
        for times in 1..=5 {
            assert_eq!(policy.escalate(times), (Duration::zero(), Duration::zero()));
        }
    }

    #[test]
    fn test_linear_reference_curve() {
        let policy = LinearEscalation::default();
        assert_eq!(
            policy.escalate(6),
            (Duration::minutes(1), Duration::minutes(2))
        );
        assert_eq!(
            policy.escalate(7),
            (Duration::minutes(2), Duration::minutes(4))
        );
        assert_eq!(
            policy.escalate(8),
            (Duration::minutes(3), Duration::minutes(6))
        );
    }

    #[test]
    fn test_linear_caps() {
        let policy = LinearEscalation::default()
            .with_caps(Duration::minutes(10), Duration::minutes(15));

        assert_eq!(
            policy.escalate(100),
            (Duration::minutes(10), Duration::minutes(15))
        );
        assert_eq!(
            policy.escalate(u32::MAX),
            (Duration::minutes(10), Duration::minutes(15))
        );
    }

    #[test]
    fn test_linear_idle_reset_applies_only_in_free_band() {
        let policy = LinearEscalation::new(3, Duration::seconds(30), Duration::seconds(90))
            .with_idle_reset(Duration::minutes(5));

        assert_eq!(policy.escalate(2), (Duration::zero(), Duration::minutes(5)));
        assert_eq!(
            policy.escalate(4),
            (Duration::seconds(30), Duration::seconds(90))
        );
    }

    #[test]
    fn test_linear_uncapped_does_not_overflow() {
        let policy = LinearEscalation {
            lock_step_secs: u64::MAX,
            ..LinearEscalation::default()
        };
        let (lock, _) = policy.escalate(u32::MAX);
        assert!(lock > Duration::zero());
    }

    #[test]
    fn test_parse_from_yaml() {
        let yaml = r#"
free_attempts: 3
lock_step_secs: 30
max_lock_secs: 600
"#;
        let policy: LinearEscalation = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(policy.free_attempts, 3);
        assert_eq!(policy.lock_step_secs, 30);
        assert_eq!(policy.clear_step_secs, 120);
        assert_eq!(policy.max_lock_secs, Some(600));
        assert_eq!(policy.idle_reset_secs, None);
    }
}
