//! PIN enrollment endpoint.
//!
//! Setting a PIN over an existing one is refused; changing a PIN goes
//! through admin reset or a verify-then-change flow, never a silent
//! re-set. The AlreadySet guard is part of the upsert statement itself,
//! so a concurrent enrollment cannot overwrite a hash that landed first.

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::state::PinState;
use super::storage::{UpsertOutcome, upsert_pin};
use super::types::{ErrorBody, PinRejection, SessionTokenResponse, SetPinRequest, storage_error};
use super::utils::{hash_pin, normalize_identity, valid_pin_format};
use super::verify::issue_single_use_session;

/// Enroll a 4-6 digit PIN for an identity and mint a single-use session.
#[utoipa::path(
    post,
    path = "/v1/pin/set",
    request_body = SetPinRequest,
    responses(
        (status = 200, description = "PIN set; single-use session issued", body = SessionTokenResponse),
        (status = 400, description = "Invalid PIN format or missing identity", body = ErrorBody),
        (status = 409, description = "PIN already set, or phone and email match different credentials", body = ErrorBody)
    ),
    tag = "pin"
)]
pub async fn set_pin(
    pool: Extension<PgPool>,
    state: Extension<Arc<PinState>>,
    payload: Option<Json<SetPinRequest>>,
) -> impl IntoResponse {
    let request: SetPinRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    if !valid_pin_format(&request.pin) {
        return PinRejection::InvalidPinFormat.into_response();
    }

    let Some(identity) = normalize_identity(request.phone.as_deref(), request.email.as_deref())
    else {
        return PinRejection::IdentityRequired.into_response();
    };

    let pin_hash = match hash_pin(&request.pin, state.pepper()) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash PIN: {err}");
            return storage_error();
        }
    };

    let outcome = match upsert_pin(
        &pool,
        identity.phone.as_deref(),
        identity.email.as_deref(),
        &pin_hash,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("Failed to upsert credential: {err}");
            return storage_error();
        }
    };

    match outcome {
        UpsertOutcome::Created => {}
        UpsertOutcome::AlreadySet => return PinRejection::AlreadySet.into_response(),
        UpsertOutcome::Conflict => return PinRejection::ConstraintConflict.into_response(),
    }

    match issue_single_use_session(&state, identity).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => {
            error!("Failed to issue session: {err}");
            storage_error()
        }
    }
}
