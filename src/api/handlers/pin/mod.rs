//! PIN credential and session handlers.
//!
//! This module coordinates PIN enrollment, verification, lockout, rate
//! limiting, and the session tokens that gate sensitive kiosk actions.
//!
//! ## Brute-force Resistance
//!
//! Two independent mechanisms guard verification:
//!
//! - **Lockout:** 5 consecutive wrong PINs lock the identity for 15
//!   minutes. Correct PINs are refused while locked, and a locked call
//!   does not consume an attempt.
//! - **Rate limiting:** at most 15 verification calls per identity key
//!   inside a rolling 5-minute window, right or wrong. A rate-limited
//!   call never touches the credential row.
//!
//! ## Pepper
//!
//! PIN hashes are Argon2id with a per-row salt and a server-side pepper
//! supplied at startup. The pepper is never stored with credentials.
//!
//! > **Warning:** Rotating the pepper invalidates every stored PIN;
//! > identities must re-enroll through the admin reset flow.

pub(crate) mod admin;
pub(crate) mod enroll;
mod lockout;
mod rate_limit;
pub(crate) mod session;
mod session_store;
mod state;
mod storage;
pub(crate) mod status;
pub(crate) mod types;
mod utils;
pub(crate) mod verify;

pub use rate_limit::{NoopRateLimiter, RateLimiter, SlidingWindowLimiter};
pub use session_store::SessionStore;
pub use state::{PinConfig, PinState};
