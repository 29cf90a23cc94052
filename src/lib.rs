//! # Custode (PIN Credential & Session Authority)
//!
//! `custode` gates reuse of a stored payment instrument behind a short
//! numeric PIN for an unattended kiosk fleet. It owns four things and
//! nothing else:
//!
//! - **Credentials:** one durable row per identity (phone and/or email)
//!   holding a salted, peppered Argon2id PIN hash, a failure counter,
//!   and a lockout expiry.
//! - **Lockout:** five consecutive wrong PINs lock the identity for
//!   fifteen minutes, independent of call-volume limits.
//! - **Rate limiting:** a sliding five-minute window throttles
//!   verification *volume* per identity key regardless of whether the
//!   supplied PIN is correct.
//! - **Sessions:** successful verification mints a short-lived,
//!   single-use bearer token held in process memory; presenting it
//!   unlocks exactly one sensitive action. A restart invalidates all
//!   sessions by design.
//!
//! Payment processing, customer records, and CRM sync live in the
//! kiosk routing layer and talk to this service only through the HTTP
//! surface under `/v1`.
//!
//! ## Identity Model
//!
//! Phone numbers are normalized to a canonical digit string and emails
//! to lowercase. Both columns are independently unique; lookups try
//! phone first and fall back to email, and two distinct rows are never
//! merged.
//!
//! ## Deployment
//!
//! Session and rate-limit state are process-local. Running more than
//! one instance requires a shared store and is out of scope.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
