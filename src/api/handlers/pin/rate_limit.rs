//! Rate limiting primitives for PIN verification.
//!
//! The limiter throttles verification *volume* per identity key inside a
//! rolling window. It is deliberately independent of the lockout policy:
//! lockout punishes wrong answers for one identity, while this guards
//! against rapid polling and distributed guessing across many
//! identities. A rate-limited caller never touches credential state.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const DEFAULT_WINDOW_SECONDS: u64 = 5 * 60;
pub const DEFAULT_MAX_WINDOW_ATTEMPTS: usize = 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited { retry_after: Duration },
}

pub trait RateLimiter: Send + Sync {
    fn check(&self, key: &str) -> RateLimitDecision;
}

/// Limiter that admits everything; used by tests and opt-out wiring.
#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _key: &str) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

/// Sliding-window limiter over an in-memory per-key attempt ledger.
///
/// Each check prunes entries older than the window and then either
/// records the attempt or refuses with the time until the oldest
/// surviving entry leaves the window. Prune-then-append happens under
/// one lock so two concurrent checks cannot both slip past the limit.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    window: Duration,
    max_attempts: usize,
    ledger: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    #[must_use]
    pub fn new(window: Duration, max_attempts: usize) -> Self {
        Self {
            window,
            max_attempts,
            ledger: Mutex::new(HashMap::new()),
        }
    }

    fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let Ok(mut ledger) = self.ledger.lock() else {
            // A poisoned ledger fails open: lockout still guards wrong PINs.
            return RateLimitDecision::Allowed;
        };

        let entries = ledger.entry(key.to_string()).or_default();
        while let Some(&oldest) = entries.front() {
            if now.duration_since(oldest) >= self.window {
                entries.pop_front();
            } else {
                break;
            }
        }

        if entries.len() >= self.max_attempts {
            let retry_after = entries.front().map_or(self.window, |&oldest| {
                self.window.saturating_sub(now.duration_since(oldest))
            });
            return RateLimitDecision::Limited { retry_after };
        }

        entries.push_back(now);
        RateLimitDecision::Allowed
    }
}

impl RateLimiter for SlidingWindowLimiter {
    fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_rate_limiter_allows() {
        let limiter = NoopRateLimiter;
        assert_eq!(limiter.check("5551234567"), RateLimitDecision::Allowed);
    }

    #[test]
    fn window_admits_up_to_the_limit() {
        let limiter = SlidingWindowLimiter::new(Duration::from_secs(300), 15);
        let now = Instant::now();
        for _ in 0..15 {
            assert_eq!(
                limiter.check_at("5551234567", now),
                RateLimitDecision::Allowed
            );
        }
        let decision = limiter.check_at("5551234567", now);
        let RateLimitDecision::Limited { retry_after } = decision else {
            panic!("sixteenth check should be limited, got {decision:?}");
        };
        assert!(retry_after > Duration::ZERO);
        assert!(retry_after <= Duration::from_secs(300));
    }

    #[test]
    fn retry_after_tracks_oldest_entry() {
        let limiter = SlidingWindowLimiter::new(Duration::from_secs(300), 2);
        let start = Instant::now();
        assert_eq!(limiter.check_at("key", start), RateLimitDecision::Allowed);
        let later = start + Duration::from_secs(100);
        assert_eq!(limiter.check_at("key", later), RateLimitDecision::Allowed);

        let decision = limiter.check_at("key", start + Duration::from_secs(120));
        assert_eq!(
            decision,
            RateLimitDecision::Limited {
                retry_after: Duration::from_secs(180)
            }
        );
    }

    #[test]
    fn entries_expire_out_of_the_window() {
        let limiter = SlidingWindowLimiter::new(Duration::from_secs(300), 1);
        let start = Instant::now();
        assert_eq!(limiter.check_at("key", start), RateLimitDecision::Allowed);
        assert!(matches!(
            limiter.check_at("key", start + Duration::from_secs(10)),
            RateLimitDecision::Limited { .. }
        ));
        // The first entry leaves the window after 300s, freeing a slot.
        assert_eq!(
            limiter.check_at("key", start + Duration::from_secs(300)),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn keys_are_independent() {
        let limiter = SlidingWindowLimiter::new(Duration::from_secs(300), 1);
        let now = Instant::now();
        assert_eq!(limiter.check_at("5551234567", now), RateLimitDecision::Allowed);
        assert!(matches!(
            limiter.check_at("5551234567", now),
            RateLimitDecision::Limited { .. }
        ));
        assert_eq!(
            limiter.check_at("alice@example.com", now),
            RateLimitDecision::Allowed
        );
    }
}
