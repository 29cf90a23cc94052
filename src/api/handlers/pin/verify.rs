//! PIN verification endpoint.
//!
//! Flow Overview: rate-limit check, credential lookup, lockout check,
//! peppered hash comparison, then either a failure record or a fresh
//! single-use session. A rate-limited call returns before any
//! credential work so the lockout counter is never touched by volume
//! throttling.

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::lockout::{attempts_remaining, is_locked};
use super::rate_limit::RateLimitDecision;
use super::state::PinState;
use super::storage::{clear_failures, lookup, record_failure};
use super::types::{
    ErrorBody, Identity, PinRejection, SessionTokenResponse, VerifyPinRequest, storage_error,
};
use super::utils::{normalize_identity, verify_pin_hash};

/// Mint the single-use session returned by successful set/verify calls.
pub(super) async fn issue_single_use_session(
    state: &PinState,
    identity: Identity,
) -> anyhow::Result<SessionTokenResponse> {
    let (session_token, _expires_at) = state.sessions().create(identity, true).await?;
    Ok(SessionTokenResponse {
        session_token,
        expires_in_ms: state.config().session_ttl_ms(),
    })
}

/// Verify a candidate PIN and mint a single-use session on success.
#[utoipa::path(
    post,
    path = "/v1/pin/verify",
    request_body = VerifyPinRequest,
    responses(
        (status = 200, description = "PIN verified; single-use session issued", body = SessionTokenResponse),
        (status = 400, description = "Phone or email required", body = ErrorBody),
        (status = 401, description = "Wrong PIN", body = ErrorBody),
        (status = 404, description = "No PIN set for this identity", body = ErrorBody),
        (status = 423, description = "Identity locked out", body = ErrorBody),
        (status = 429, description = "Verification volume exceeded", body = ErrorBody)
    ),
    tag = "pin"
)]
pub async fn verify_pin(
    pool: Extension<PgPool>,
    state: Extension<Arc<PinState>>,
    payload: Option<Json<VerifyPinRequest>>,
) -> impl IntoResponse {
    let request: VerifyPinRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let Some(identity) = normalize_identity(request.phone.as_deref(), request.email.as_deref())
    else {
        return PinRejection::IdentityRequired.into_response();
    };

    // Volume limit first: a refused call must not touch credential state.
    if let RateLimitDecision::Limited { retry_after } =
        state.rate_limiter().check(identity.rate_key())
    {
        return PinRejection::RateLimited {
            retry_after_seconds: retry_after.as_secs().max(1),
        }
        .into_response();
    }

    let row = match lookup(&pool, identity.phone.as_deref(), identity.email.as_deref()).await {
        Ok(Some(row)) => row,
        Ok(None) => return PinRejection::NotSet.into_response(),
        Err(err) => {
            error!("Failed to lookup credential: {err}");
            return storage_error();
        }
    };
    let Some(stored_hash) = row.pin_hash.clone() else {
        return PinRejection::NotSet.into_response();
    };

    // A locked identity is refused outright; the attempt is not counted.
    if let Some(locked_until) = row.locked_until {
        if is_locked(Some(locked_until), Utc::now()) {
            return PinRejection::Locked { locked_until }.into_response();
        }
    }

    let matches = match verify_pin_hash(&request.pin, &stored_hash, state.pepper()) {
        Ok(matches) => matches,
        Err(err) => {
            error!("Failed to verify PIN hash: {err}");
            return storage_error();
        }
    };

    if !matches {
        let max_attempts = state.config().max_attempts();
        let failure = match record_failure(
            &pool,
            row.id,
            max_attempts,
            state.config().lockout_seconds(),
        )
        .await
        {
            Ok(failure) => failure,
            Err(err) => {
                error!("Failed to record PIN failure: {err}");
                return storage_error();
            }
        };
        return PinRejection::BadPin {
            attempts_remaining: attempts_remaining(failure.failure_count, max_attempts),
            locked: is_locked(failure.locked_until, Utc::now()),
        }
        .into_response();
    }

    if let Err(err) = clear_failures(&pool, row.id).await {
        error!("Failed to clear PIN failures: {err}");
        return storage_error();
    }

    match issue_single_use_session(&state, identity).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => {
            error!("Failed to issue session: {err}");
            storage_error()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::rate_limit::NoopRateLimiter;
    use super::super::session_store::SessionStore;
    use super::super::state::{PinConfig, PinState};
    use super::super::types::VerifyPinRequest;
    use super::verify_pin;
    use anyhow::Result;
    use axum::Json;
    use axum::extract::Extension;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
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

    #[tokio::test]
    async fn verify_pin_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify_pin(Extension(pool), Extension(pin_state()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn verify_pin_requires_identity() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify_pin(
            Extension(pool),
            Extension(pin_state()),
            Some(Json(VerifyPinRequest {
                phone: None,
                email: None,
                pin: "1234".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
