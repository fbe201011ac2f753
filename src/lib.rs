//! Lockout - Escalating Attempt Limiter
//!
//! This crate throttles repeated actions such as failed logins, keyed by an
//! arbitrary string. Each key accumulates a count, an injected escalation
//! policy turns the count into lock and clear windows, and expired entries are
//! reclaimed a few at a time so no call ever sweeps the whole store.

pub mod config;
pub mod error;
pub mod guard;
pub mod limiter;
