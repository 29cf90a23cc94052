//! Session token endpoints for bearer auth.
//!
//! `GET /v1/session` inspects a token without consuming it; the routing
//! layer in front of a sensitive action calls `POST /v1/session/consume`
//! exactly once so a leaked single-use token cannot be replayed inside
//! its TTL window. Revocation is idempotent.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;

use super::session_store::ConsumeOutcome;
use super::state::PinState;
use super::types::{ErrorBody, OkResponse, PinRejection, SessionCheckResponse};
use super::utils::extract_bearer_token;

/// Inspect the presented session token.
#[utoipa::path(
    get,
    path = "/v1/session",
    responses(
        (status = 200, description = "Session is live", body = SessionCheckResponse),
        (status = 401, description = "Missing, invalid, or expired token", body = ErrorBody),
        (status = 410, description = "Single-use session already consumed", body = ErrorBody)
    ),
    tag = "session"
)]
pub async fn session_check(
    headers: HeaderMap,
    state: Extension<Arc<PinState>>,
) -> impl IntoResponse {
    let Some(token) = extract_bearer_token(&headers) else {
        return PinRejection::MissingSession.into_response();
    };

    let Some(session) = state.sessions().get(&token).await else {
        return PinRejection::InvalidOrExpired.into_response();
    };

    // Reading never consumes, but a consumed single-use token is
    // reported as such rather than pretending it still unlocks anything.
    if session.single_use && session.used {
        return PinRejection::Consumed.into_response();
    }

    (
        StatusCode::OK,
        Json(SessionCheckResponse {
            phone: session.identity.phone,
            email: session.identity.email,
            expires_at: session.expires_at,
            single_use: session.single_use,
        }),
    )
        .into_response()
}

/// Consume the presented session token for one sensitive action.
#[utoipa::path(
    post,
    path = "/v1/session/consume",
    responses(
        (status = 200, description = "Session consumed", body = OkResponse),
        (status = 401, description = "Missing, invalid, or expired token", body = ErrorBody),
        (status = 410, description = "Single-use session already consumed", body = ErrorBody)
    ),
    tag = "session"
)]
pub async fn consume_session(
    headers: HeaderMap,
    state: Extension<Arc<PinState>>,
) -> impl IntoResponse {
    let Some(token) = extract_bearer_token(&headers) else {
        return PinRejection::MissingSession.into_response();
    };

    match state.sessions().consume(&token).await {
        ConsumeOutcome::Consumed => (StatusCode::OK, Json(OkResponse { ok: true })).into_response(),
        ConsumeOutcome::AlreadyUsed => PinRejection::Consumed.into_response(),
        ConsumeOutcome::Missing => PinRejection::InvalidOrExpired.into_response(),
    }
}

/// Drop the presented session token. Always succeeds.
#[utoipa::path(
    post,
    path = "/v1/session/revoke",
    responses(
        (status = 200, description = "Session revoked (or was already gone)", body = OkResponse)
    ),
    tag = "session"
)]
pub async fn revoke_session(
    headers: HeaderMap,
    state: Extension<Arc<PinState>>,
) -> impl IntoResponse {
    if let Some(token) = extract_bearer_token(&headers) {
        state.sessions().revoke(&token).await;
    }
    (StatusCode::OK, Json(OkResponse { ok: true }))
}
