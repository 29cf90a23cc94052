//! Lockout policy: pure decisions over failure counts and timestamps.
//!
//! No I/O happens here. The credential store mirrors
//! `next_failure_state` in a single SQL statement so the durable
//! transition is atomic per row; these functions are the reference
//! semantics and drive the derived fields in status/verify responses.

use chrono::{DateTime, Duration, Utc};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_LOCKOUT_SECONDS: i64 = 15 * 60;

/// Updated failure state after one more wrong PIN.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FailureState {
    pub failure_count: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

/// An identity is locked iff a lockout expiry is set and still ahead of `now`.
#[must_use]
pub fn is_locked(locked_until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    locked_until.is_some_and(|until| until > now)
}

/// State transition for one recorded failure: increment the counter and,
/// at the threshold, start the lockout clock. An existing expiry is kept.
#[must_use]
pub fn next_failure_state(
    failure_count: u32,
    locked_until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    max_attempts: u32,
    lockout: Duration,
) -> FailureState {
    let next_count = failure_count.saturating_add(1);
    let locked_until = if next_count >= max_attempts {
        Some(now + lockout)
    } else {
        locked_until
    };
    FailureState {
        failure_count: next_count,
        locked_until,
    }
}

#[must_use]
pub fn attempts_remaining(failure_count: u32, max_attempts: u32) -> u32 {
    max_attempts.saturating_sub(failure_count)
}

/// Whole minutes until the lockout expires, rounded up; 0 when unlocked.
#[must_use]
pub fn lock_minutes_remaining(locked_until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    let Some(until) = locked_until else {
        return 0;
    };
    let seconds = (until - now).num_seconds();
    if seconds <= 0 {
        return 0;
    }
    (seconds + 59) / 60
}
