//! Login attempt guard built on the limiter.
//!
//! Tracks two key domains in one limiter: the client address (`ip:<addr>`)
//! and the account name (`login:<username>`). An attempt is refused while
//! either key is locked.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};

use crate::limiter::TimesLimiter;

/// Outcome of a guard check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The attempt may proceed
    Allow,
    /// The attempt must be refused until `retry_after` has elapsed
    Deny { retry_after: Duration },
}

impl Decision {
    fn from_lock(lock_in: Duration) -> Self {
        if lock_in > Duration::zero() {
            Decision::Deny {
                retry_after: lock_in,
            }
        } else {
            Decision::Allow
        }
    }

    /// Whether the attempt may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Guards an authentication flow against brute forcing.
#[derive(Clone)]
pub struct AttemptGuard {
    limiter: Arc<TimesLimiter>,
}

impl AttemptGuard {
    pub fn new(limiter: Arc<TimesLimiter>) -> Self {
        Self { limiter }
    }

    /// Limiter key for a client address.
    pub fn ip_key(ip: IpAddr) -> String {
        format!("ip:{}", ip)
    }

    /// Limiter key for an account name.
    pub fn login_key(username: &str) -> String {
        format!("login:{}", username)
    }

    /// Whether an attempt from `ip` on `username` may proceed right now.
    pub fn check(&self, ip: IpAddr, username: &str) -> Decision {
        let by_ip = self.limiter.check_limit(&Self::ip_key(ip)).lock_in;
        let by_login = self.limiter.check_limit(&Self::login_key(username)).lock_in;
        Decision::from_lock(by_ip.max(by_login))
    }

    /// Record a failed attempt against both keys.
    pub fn record_failure(&self, ip: IpAddr, username: &str) -> Decision {
        let by_ip = self.limiter.add_one_times(&Self::ip_key(ip)).lock_in;
        let by_login = self
            .limiter
            .add_one_times(&Self::login_key(username))
            .lock_in;

        let decision = Decision::from_lock(by_ip.max(by_login));
        if let Decision::Deny { retry_after } = decision {
            warn!(
                ip = %ip,
                username = %username,
                retry_after_secs = retry_after.num_seconds(),
                "Login attempts locked"
            );
        }
        decision
    }

    /// Clear the account's count after a successful login.
    ///
    /// The address keeps its count so one valid account cannot be used to
    /// reset throttling for guesses against other accounts.
    pub fn record_success(&self, username: &str) {
        self.limiter.remove_limit(&Self::login_key(username));
    }

    /// Administrative override: forget everything about `ip`.
    pub fn release_ip(&self, ip: IpAddr) {
        info!(ip = %ip, "Releasing address lock");
        self.limiter.remove_limit(&Self::ip_key(ip));
    }

    pub fn limiter(&self) -> &Arc<TimesLimiter> {
        &self.limiter
    }
}
