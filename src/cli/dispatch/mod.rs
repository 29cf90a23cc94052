//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the
//! appropriate action, such as starting the API server with its full
//! configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::pin;
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let pin_opts = pin::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        pepper: pin_opts.pepper,
        admin_key: pin_opts.admin_key,
        max_attempts: pin_opts.max_attempts,
        lockout_seconds: pin_opts.lockout_seconds,
        verify_window_seconds: pin_opts.verify_window_seconds,
        verify_window_max_attempts: pin_opts.verify_window_max_attempts,
        session_ttl_seconds: pin_opts.session_ttl_seconds,
        session_reap_seconds: pin_opts.session_reap_seconds,
        kiosk_base_url: pin_opts.kiosk_base_url,
    }))
}
