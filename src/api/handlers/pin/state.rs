//! PIN policy configuration and shared handler state.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;

use super::lockout::{DEFAULT_LOCKOUT_SECONDS, DEFAULT_MAX_ATTEMPTS};
use super::rate_limit::{DEFAULT_MAX_WINDOW_ATTEMPTS, DEFAULT_WINDOW_SECONDS, RateLimiter};
use super::session_store::{DEFAULT_REAP_INTERVAL_SECONDS, DEFAULT_SESSION_TTL_SECONDS, SessionStore};
use super::utils::admin_key_matches;

#[derive(Clone, Debug)]
pub struct PinConfig {
    kiosk_base_url: String,
    max_attempts: u32,
    lockout_seconds: i64,
    verify_window_seconds: u64,
    verify_window_max_attempts: usize,
    session_ttl_seconds: u64,
    session_reap_seconds: u64,
}

impl PinConfig {
    #[must_use]
    pub fn new(kiosk_base_url: String) -> Self {
        Self {
            kiosk_base_url,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lockout_seconds: DEFAULT_LOCKOUT_SECONDS,
            verify_window_seconds: DEFAULT_WINDOW_SECONDS,
            verify_window_max_attempts: DEFAULT_MAX_WINDOW_ATTEMPTS,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            session_reap_seconds: DEFAULT_REAP_INTERVAL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_lockout_seconds(mut self, seconds: i64) -> Self {
        self.lockout_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_verify_window_seconds(mut self, seconds: u64) -> Self {
        self.verify_window_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_verify_window_max_attempts(mut self, max_attempts: usize) -> Self {
        self.verify_window_max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: u64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_reap_seconds(mut self, seconds: u64) -> Self {
        self.session_reap_seconds = seconds;
        self
    }

    #[must_use]
    pub fn kiosk_base_url(&self) -> &str {
        &self.kiosk_base_url
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn lockout_seconds(&self) -> i64 {
        self.lockout_seconds
    }

    #[must_use]
    pub fn verify_window(&self) -> Duration {
        Duration::from_secs(self.verify_window_seconds)
    }

    #[must_use]
    pub fn verify_window_max_attempts(&self) -> usize {
        self.verify_window_max_attempts
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    #[must_use]
    pub fn session_ttl_ms(&self) -> u64 {
        self.session_ttl_seconds.saturating_mul(1000)
    }

    #[must_use]
    pub fn session_reap_interval(&self) -> Duration {
        Duration::from_secs(self.session_reap_seconds)
    }
}

/// Shared state for the PIN handlers.
///
/// The session store and rate limiter are injected instances, not
/// process-wide globals, so tests can stand up isolated copies.
pub struct PinState {
    config: PinConfig,
    sessions: Arc<SessionStore>,
    rate_limiter: Arc<dyn RateLimiter>,
    pepper: SecretString,
    admin_key: SecretString,
}

impl PinState {
    #[must_use]
    pub fn new(
        config: PinConfig,
        sessions: Arc<SessionStore>,
        rate_limiter: Arc<dyn RateLimiter>,
        pepper: SecretString,
        admin_key: SecretString,
    ) -> Self {
        Self {
            config,
            sessions,
            rate_limiter,
            pepper,
            admin_key,
        }
    }

    #[must_use]
    pub fn config(&self) -> &PinConfig {
        &self.config
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub(super) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }

    pub(super) fn pepper(&self) -> &[u8] {
        self.pepper.expose_secret().as_bytes()
    }

    pub(super) fn admin_key_is(&self, presented: &str) -> bool {
        admin_key_matches(presented, self.admin_key.expose_secret())
    }
}

#[cfg(test)]
mod tests {
    use super::super::rate_limit::NoopRateLimiter;
    use super::*;

    #[test]
    fn pin_config_defaults_and_overrides() {
        let config = PinConfig::new("https://kiosk.custode.dev".to_string());

        assert_eq!(config.kiosk_base_url(), "https://kiosk.custode.dev");
        assert_eq!(config.max_attempts(), 5);
        assert_eq!(config.lockout_seconds(), 900);
        assert_eq!(config.verify_window(), Duration::from_secs(300));
        assert_eq!(config.verify_window_max_attempts(), 15);
        assert_eq!(config.session_ttl(), Duration::from_secs(1800));
        assert_eq!(config.session_ttl_ms(), 1_800_000);
        assert_eq!(config.session_reap_interval(), Duration::from_secs(300));

        let config = config
            .with_max_attempts(3)
            .with_lockout_seconds(60)
            .with_verify_window_seconds(30)
            .with_verify_window_max_attempts(2)
            .with_session_ttl_seconds(120)
            .with_session_reap_seconds(10);

        assert_eq!(config.max_attempts(), 3);
        assert_eq!(config.lockout_seconds(), 60);
        assert_eq!(config.verify_window(), Duration::from_secs(30));
        assert_eq!(config.verify_window_max_attempts(), 2);
        assert_eq!(config.session_ttl(), Duration::from_secs(120));
        assert_eq!(config.session_reap_interval(), Duration::from_secs(10));
    }

    #[test]
    fn pin_state_checks_admin_key() {
        let config = PinConfig::new("https://kiosk.custode.dev".to_string());
        let sessions = Arc::new(SessionStore::new(config.session_ttl()));
        let state = PinState::new(
            config,
            sessions,
            Arc::new(NoopRateLimiter),
            SecretString::from("pepper".to_string()),
            SecretString::from("admin-key".to_string()),
        );

        assert!(state.admin_key_is("admin-key"));
        assert!(!state.admin_key_is("wrong"));
        assert_eq!(state.pepper(), b"pepper");
    }
}
