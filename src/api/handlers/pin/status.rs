//! Read-only PIN status endpoint.
//!
//! The kiosk UI calls this before prompting so it can skip the PIN pad
//! entirely (no PIN set), warn about a lockout, or reuse a live session.

use axum::{
    Json,
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::lockout::{attempts_remaining, is_locked, lock_minutes_remaining};
use super::state::PinState;
use super::storage::lookup;
use super::types::{PinStatusResponse, StatusQuery, storage_error};
use super::utils::{extract_bearer_token, normalize_identity};

async fn session_active(state: &PinState, headers: &HeaderMap) -> bool {
    let Some(token) = extract_bearer_token(headers) else {
        return false;
    };
    // A consumed single-use token no longer unlocks anything.
    state
        .sessions()
        .get(&token)
        .await
        .is_some_and(|session| !(session.single_use && session.used))
}

/// Report PIN and lockout state for an identity.
#[utoipa::path(
    get,
    path = "/v1/pin/status",
    params(StatusQuery),
    responses(
        (status = 200, description = "Current PIN state for the identity", body = PinStatusResponse)
    ),
    tag = "pin"
)]
pub async fn pin_status(
    headers: HeaderMap,
    query: Query<StatusQuery>,
    pool: Extension<PgPool>,
    state: Extension<Arc<PinState>>,
) -> impl IntoResponse {
    let max_attempts = state.config().max_attempts();
    let session_active = session_active(&state, &headers).await;

    // An unknown or absent identity reads as "no PIN set" instead of an
    // error; the UI treats both the same way.
    let Some(identity) = normalize_identity(query.phone.as_deref(), query.email.as_deref()) else {
        return (
            StatusCode::OK,
            Json(PinStatusResponse {
                pin_set: false,
                locked: false,
                locked_minutes_remaining: 0,
                attempts: 0,
                attempts_remaining: max_attempts,
                session_active,
            }),
        )
            .into_response();
    };

    let row = match lookup(&pool, identity.phone.as_deref(), identity.email.as_deref()).await {
        Ok(row) => row,
        Err(err) => {
            error!("Failed to lookup credential: {err}");
            return storage_error();
        }
    };

    let now = Utc::now();
    let response = match row {
        Some(row) => PinStatusResponse {
            pin_set: row.pin_hash.is_some(),
            locked: is_locked(row.locked_until, now),
            locked_minutes_remaining: lock_minutes_remaining(row.locked_until, now),
            attempts: row.failure_count,
            attempts_remaining: attempts_remaining(row.failure_count, max_attempts),
            session_active,
        },
        None => PinStatusResponse {
            pin_set: false,
            locked: false,
            locked_minutes_remaining: 0,
            attempts: 0,
            attempts_remaining: max_attempts,
            session_active,
        },
    };

    (StatusCode::OK, Json(response)).into_response()
}

#[cfg(test)]
mod tests {
    use super::super::rate_limit::NoopRateLimiter;
    use super::super::session_store::SessionStore;
    use super::super::state::{PinConfig, PinState};
    use super::super::types::Identity;
    use super::session_active;
    use anyhow::Result;
    use axum::http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
    use secrecy::SecretString;
    use std::sync::Arc;

    fn pin_state() -> Arc<PinState> {
        let config = PinConfig::new("https://kiosk.custode.dev".to_string());
        let sessions = Arc::new(SessionStore::new(config.session_ttl()));
        Arc::new(PinState::new(
            config,
            sessions,
            Arc::new(NoopRateLimiter),
            SecretString::from("pepper".to_string()),
            SecretString::from("admin-key".to_string()),
        ))
    }

    fn identity() -> Identity {
        Identity {
            phone: Some("5551234567".to_string()),
            email: None,
        }
    }

    #[tokio::test]
    async fn session_active_without_token() {
        let state = pin_state();
        assert!(!session_active(&state, &HeaderMap::new()).await);
    }

    #[tokio::test]
    async fn session_active_with_live_token() -> Result<()> {
        let state = pin_state();
        let (token, _) = state.sessions().create(identity(), true).await?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))?,
        );
        assert!(session_active(&state, &headers).await);
        Ok(())
    }

    #[tokio::test]
    async fn consumed_session_is_not_active() -> Result<()> {
        let state = pin_state();
        let (token, _) = state.sessions().create(identity(), true).await?;
        state.sessions().consume(&token).await;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))?,
        );
        assert!(!session_active(&state, &headers).await);
        Ok(())
    }
}
