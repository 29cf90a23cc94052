//! API handlers for Custode.
//!
//! This module organizes the service's route handlers: the PIN
//! credential/session surface under `pin` and the health probe.

pub mod health;
pub mod pin;
