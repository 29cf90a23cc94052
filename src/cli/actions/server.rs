use crate::api::{self, handlers::pin::PinConfig};
use crate::cli::telemetry;
use anyhow::Result;
use secrecy::SecretString;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub pepper: SecretString,
    pub admin_key: SecretString,
    pub max_attempts: u32,
    pub lockout_seconds: i64,
    pub verify_window_seconds: u64,
    pub verify_window_max_attempts: usize,
    pub session_ttl_seconds: u64,
    pub session_reap_seconds: u64,
    pub kiosk_base_url: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let pin_config = PinConfig::new(args.kiosk_base_url)
        .with_max_attempts(args.max_attempts)
        .with_lockout_seconds(args.lockout_seconds)
        .with_verify_window_seconds(args.verify_window_seconds)
        .with_verify_window_max_attempts(args.verify_window_max_attempts)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_session_reap_seconds(args.session_reap_seconds);

    let result = api::new(args.port, args.dsn, pin_config, args.pepper, args.admin_key).await;
    telemetry::shutdown_tracer();
    result
}
