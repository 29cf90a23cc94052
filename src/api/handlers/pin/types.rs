//! Request/response types and policy outcomes for PIN endpoints.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// A kiosk user identity: a canonical phone digit string and/or a
/// lower-cased email. At least one key is always present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl Identity {
    /// Rate-limit key: phone takes precedence over email, mirroring the
    /// credential lookup order.
    #[must_use]
    pub fn rate_key(&self) -> &str {
        self.phone
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or_default()
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SetPinRequest {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub pin: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyPinRequest {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub pin: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionTokenResponse {
    pub session_token: String,
    pub expires_in_ms: u64,
}

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct StatusQuery {
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PinStatusResponse {
    pub pin_set: bool,
    pub locked: bool,
    pub locked_minutes_remaining: i64,
    pub attempts: u32,
    pub attempts_remaining: u32,
    pub session_active: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionCheckResponse {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub single_use: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AdminResetRequest {
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AdminResetResponse {
    pub ok: bool,
    pub rows_affected: u64,
}

/// Machine-readable failure body. Numeric detail is attached only where
/// it means something for the kiosk UI.
#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts_remaining: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

impl ErrorBody {
    fn new(error: &str) -> Self {
        Self {
            error: error.to_string(),
            ..Self::default()
        }
    }
}

/// Generic storage-fault response. Full detail stays in the server log;
/// the caller only learns that the operation failed and may re-submit.
pub(super) fn storage_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new("internal_error")),
    )
        .into_response()
}

/// Expected verification outcomes. These are control flow, not faults:
/// none of them is retried internally and none carries internal detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PinRejection {
    #[error("PIN must be 4-6 digits")]
    InvalidPinFormat,
    #[error("PIN already set")]
    AlreadySet,
    #[error("phone and email match different credentials")]
    ConstraintConflict,
    #[error("no PIN set")]
    NotSet,
    #[error("identity locked")]
    Locked { locked_until: DateTime<Utc> },
    #[error("bad PIN")]
    BadPin { attempts_remaining: u32, locked: bool },
    #[error("rate limited")]
    RateLimited { retry_after_seconds: u64 },
    #[error("phone or email required")]
    IdentityRequired,
    #[error("forbidden")]
    Forbidden,
    #[error("missing session")]
    MissingSession,
    #[error("invalid or expired session")]
    InvalidOrExpired,
    #[error("session consumed")]
    Consumed,
}

impl PinRejection {
    /// Stable machine-readable kind rendered in the response body.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidPinFormat => "invalid_pin_format",
            Self::AlreadySet => "already_set",
            Self::ConstraintConflict => "constraint_conflict",
            Self::NotSet => "not_set",
            Self::Locked { .. } => "locked",
            Self::BadPin { .. } => "bad_pin",
            Self::RateLimited { .. } => "rate_limited",
            Self::IdentityRequired => "phone_or_email_required",
            Self::Forbidden => "forbidden",
            Self::MissingSession => "missing_session",
            Self::InvalidOrExpired => "invalid_or_expired",
            Self::Consumed => "consumed",
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidPinFormat | Self::IdentityRequired => StatusCode::BAD_REQUEST,
            Self::AlreadySet | Self::ConstraintConflict => StatusCode::CONFLICT,
            Self::NotSet => StatusCode::NOT_FOUND,
            Self::Locked { .. } => StatusCode::LOCKED,
            Self::BadPin { .. } | Self::MissingSession | Self::InvalidOrExpired => {
                StatusCode::UNAUTHORIZED
            }
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Consumed => StatusCode::GONE,
        }
    }
}

impl IntoResponse for PinRejection {
    fn into_response(self) -> Response {
        let mut body = ErrorBody::new(self.kind());
        match self {
            Self::Locked { locked_until } => body.locked_until = Some(locked_until),
            Self::BadPin {
                attempts_remaining,
                locked,
            } => {
                body.attempts_remaining = Some(attempts_remaining);
                body.locked = Some(locked);
            }
            Self::RateLimited {
                retry_after_seconds,
            } => body.retry_after_seconds = Some(retry_after_seconds),
            _ => {}
        }
        (self.status(), Json(body)).into_response()
    }
}
