//! The attempt limiter store.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use super::clock::{SystemClock, TimeSource};
use super::entry::LimitStatus;
use super::policy::EscalationPolicy;
use super::table::EntryTable;
use crate::config::LimiterConfig;

/// Counts attempts per key and locks keys according to an escalation policy.
///
/// One mutex guards all state and is held for the whole of each operation.
/// Expired entries are reclaimed a few at a time, only when a key starts a
/// fresh count, so no call ever sweeps the whole table.
///
/// This struct is thread-safe and can be shared across threads with `Arc`.
pub struct TimesLimiter {
    table: Mutex<EntryTable>,
    policy: Box<dyn EscalationPolicy>,
    clock: Arc<dyn TimeSource>,
    eviction_candidates: usize,
}

impl TimesLimiter {
    /// Create a limiter on the wall clock with default settings.
    pub fn new<P>(policy: P) -> Self
    where
        P: EscalationPolicy + 'static,
    {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    /// Create a limiter reading time from `clock`.
    pub fn with_clock<P>(policy: P, clock: Arc<dyn TimeSource>) -> Self
    where
        P: EscalationPolicy + 'static,
    {
        Self::with_config(policy, clock, &LimiterConfig::default())
    }

    /// Create a limiter with explicit store configuration.
    pub fn with_config<P>(policy: P, clock: Arc<dyn TimeSource>, config: &LimiterConfig) -> Self
    where
        P: EscalationPolicy + 'static,
    {
        Self {
            table: Mutex::new(EntryTable::new(config.sampling, config.seed)),
            policy: Box::new(policy),
            clock,
            eviction_candidates: config.eviction_candidates.max(1),
        }
    }

    /// Record one event for `key` and return the windows the policy assigned.
    ///
    /// A key with no entry, or whose clear window has passed, starts a fresh
    /// count at 1. Starting a fresh count also evicts up to a fixed number of
    /// expired entries elsewhere in the table.
    pub fn add_one_times(&self, key: &str) -> LimitStatus {
        let (status, times, evicted) = {
            let mut table = self.table.lock();
            let now = self.clock.now();

            let fresh = table.get(key).map_or(true, |entry| entry.is_expired(now));
            let evicted = if fresh {
                table.evict_expired(self.eviction_candidates, now)
            } else {
                0
            };

            let entry = table.get_or_insert(key);
            if entry.is_expired(now) {
                entry.reset();
            }
            entry.times = entry.times.saturating_add(1);

            let (lock_in, clear_in) = self.policy.escalate(entry.times);
            entry.apply_windows(now, lock_in, clear_in);

            (LimitStatus::from_policy(lock_in, clear_in), entry.times, evicted)
        };

        if evicted > 0 {
            debug!(evicted = evicted, "Evicted expired limit entries");
        }
        if status.is_locked() {
            debug!(
                key = %key,
                times = times,
                lock_secs = status.lock_in.num_seconds(),
                clear_secs = status.clear_in.num_seconds(),
                "Key locked"
            );
        } else {
            trace!(key = %key, times = times, "Recorded attempt");
        }

        status
    }

    /// Remaining lock and clear time for `key`, without recording anything.
    ///
    /// Unknown keys and passed deadlines report zero.
    pub fn check_limit(&self, key: &str) -> LimitStatus {
        let table = self.table.lock();
        match table.get(key) {
            Some(entry) => entry.status(self.clock.now()),
            None => LimitStatus::none(),
        }
    }

    /// Forget `key` entirely. Does nothing if it is not tracked.
    pub fn remove_limit(&self, key: &str) {
        let removed = self.table.lock().remove(key);
        if removed {
            debug!(key = %key, "Limit removed");
        }
    }

    /// Current count for `key`, if it is tracked.
    pub fn times(&self, key: &str) -> Option<u32> {
        self.table.lock().get(key).map(|entry| entry.times)
    }

    /// Number of tracked keys, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    /// Entries reclaimed by opportunistic eviction since the limiter was created.
    pub fn evicted_total(&self) -> u64 {
        self.table.lock().evicted_total()
    }

    /// Whether no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.table.lock().clear();
    }
}
