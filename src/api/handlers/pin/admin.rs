//! Administrative PIN reset endpoint.
//!
//! Security boundaries: the caller must present the configured admin key
//! out-of-band in a header; the key comparison cost is uniform; and
//! every call, allowed or refused, is audit-logged with the identity it
//! acted upon. The admin key itself is never logged.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::state::PinState;
use super::storage::admin_clear_pin;
use super::types::{AdminResetRequest, AdminResetResponse, ErrorBody, PinRejection, storage_error};
use super::utils::normalize_identity;

pub const ADMIN_KEY_HEADER: &str = "x-custode-admin-key";

/// Wipe the PIN hash, failure counter, and lockout for re-enrollment.
#[utoipa::path(
    post,
    path = "/v1/pin/admin/reset",
    request_body = AdminResetRequest,
    params(
        ("X-Custode-Admin-Key" = String, Header, description = "Configured admin key")
    ),
    responses(
        (status = 200, description = "Credential wiped for re-enrollment", body = AdminResetResponse),
        (status = 400, description = "Phone or email required", body = ErrorBody),
        (status = 403, description = "Missing or wrong admin key", body = ErrorBody)
    ),
    tag = "pin"
)]
pub async fn admin_reset_pin(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<PinState>>,
    payload: Option<Json<AdminResetRequest>>,
) -> impl IntoResponse {
    let request: AdminResetRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };
    let phone = request.phone.as_deref().unwrap_or("-");
    let email = request.email.as_deref().unwrap_or("-");

    let presented = headers
        .get(ADMIN_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if presented.is_empty() || !state.admin_key_is(presented) {
        warn!(phone, email, "admin PIN reset refused: bad admin key");
        return PinRejection::Forbidden.into_response();
    }

    let Some(identity) = normalize_identity(request.phone.as_deref(), request.email.as_deref())
    else {
        warn!(phone, email, "admin PIN reset refused: identity missing");
        return PinRejection::IdentityRequired.into_response();
    };

    match admin_clear_pin(&pool, identity.phone.as_deref(), identity.email.as_deref()).await {
        Ok(rows_affected) => {
            info!(phone, email, rows_affected, "admin PIN reset applied");
            (
                StatusCode::OK,
                Json(AdminResetResponse {
                    ok: true,
                    rows_affected,
                }),
            )
                .into_response()
        }
        Err(err) => {
            error!("Failed to clear credential: {err}");
            storage_error()
        }
    }
}
