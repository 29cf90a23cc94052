//! In-memory session authority.
//!
//! Successful PIN verification mints an opaque bearer token bound to an
//! identity. Tokens live only in process memory: a restart invalidates
//! every outstanding session, which is accepted for a kiosk fleet. The
//! authoritative expiry check happens on every access; the background
//! reaper only reclaims memory and can be disabled without any
//! correctness impact.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use super::types::Identity;
use super::utils::generate_session_token;

pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 30 * 60;
pub const DEFAULT_REAP_INTERVAL_SECONDS: u64 = 5 * 60;

/// A live session. `used` flips once on single-use consumption; the
/// entry then stays around (rejecting replays as consumed) until TTL
/// eviction.
#[derive(Clone, Debug)]
pub struct Session {
    pub identity: Identity,
    pub single_use: bool,
    pub used: bool,
    pub expires_at: DateTime<Utc>,
    created_at: Instant,
}

impl Session {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }
}

/// Outcome of a consume call. The HTTP layer needs to tell a replayed
/// single-use token apart from one that never existed or expired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Consumed,
    AlreadyUsed,
    Missing,
}

pub struct SessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a session token for an identity.
    ///
    /// # Errors
    /// Returns an error if the system RNG fails.
    pub async fn create(
        &self,
        identity: Identity,
        single_use: bool,
    ) -> Result<(String, DateTime<Utc>)> {
        let token = generate_session_token()?;
        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::zero());
        let session = Session {
            identity,
            single_use,
            used: false,
            expires_at,
            created_at: Instant::now(),
        };

        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, entry| !entry.is_expired(self.ttl));
        sessions.insert(token.clone(), session);
        Ok((token, expires_at))
    }

    /// Look up a session without consuming it. Expired entries are
    /// evicted on sight so callers never observe stale state.
    pub async fn get(&self, token: &str) -> Option<Session> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(token) {
            Some(entry) if entry.is_expired(self.ttl) => {
                sessions.remove(token);
                None
            }
            Some(entry) => Some(entry.clone()),
            None => None,
        }
    }

    /// Consume a session for one sensitive action.
    ///
    /// The mark happens under the table lock, so two racing consumers of
    /// the same single-use token cannot both succeed. Multi-use sessions
    /// stay consumable until TTL expiry.
    pub async fn consume(&self, token: &str) -> ConsumeOutcome {
        let mut sessions = self.sessions.lock().await;
        let Some(entry) = sessions.get_mut(token) else {
            return ConsumeOutcome::Missing;
        };
        if entry.is_expired(self.ttl) {
            sessions.remove(token);
            return ConsumeOutcome::Missing;
        }
        if entry.single_use {
            if entry.used {
                return ConsumeOutcome::AlreadyUsed;
            }
            entry.used = true;
        }
        ConsumeOutcome::Consumed
    }

    /// Drop a session. Revoking an unknown token is a no-op.
    pub async fn revoke(&self, token: &str) {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(token);
    }

    /// Evict every expired entry; returns how many were dropped.
    pub async fn reap(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_expired(self.ttl));
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Periodic sweep of expired sessions. Memory reclamation only:
    /// `get`/`consume` already refuse expired entries, so aborting this
    /// task never affects correctness.
    pub fn spawn_reaper(store: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                let evicted = store.reap().await;
                if evicted > 0 {
                    debug!(evicted, "session reaper evicted expired sessions");
                }
            }
        })
    }
}
