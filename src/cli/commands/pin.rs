use anyhow::{Context, Result};
use clap::{Arg, Command};
use secrecy::SecretString;

pub const ARG_PIN_PEPPER: &str = "pin-pepper";
pub const ARG_ADMIN_KEY: &str = "admin-key";

pub fn with_args(command: Command) -> Command {
    let command = with_secret_args(command);
    let command = with_policy_args(command);
    with_session_args(command)
}

fn with_secret_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PIN_PEPPER)
                .long("pin-pepper")
                .help("Server-side secret mixed into every PIN hash, never stored with credentials")
                .env("CUSTODE_PIN_PEPPER")
                .required(true),
        )
        .arg(
            Arg::new(ARG_ADMIN_KEY)
                .long("admin-key")
                .help("Out-of-band key required by the admin PIN reset endpoint")
                .env("CUSTODE_ADMIN_KEY")
                .required(true),
        )
}

fn with_policy_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("pin-max-attempts")
                .long("pin-max-attempts")
                .help("Consecutive failures before an identity is locked out")
                .env("CUSTODE_PIN_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("pin-lockout-seconds")
                .long("pin-lockout-seconds")
                .help("Lockout duration after too many consecutive failures")
                .env("CUSTODE_PIN_LOCKOUT_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("verify-window-seconds")
                .long("verify-window-seconds")
                .help("Rolling window for verification rate limiting")
                .env("CUSTODE_VERIFY_WINDOW_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("verify-window-max-attempts")
                .long("verify-window-max-attempts")
                .help("Verification calls admitted per key within the rolling window")
                .env("CUSTODE_VERIFY_WINDOW_MAX_ATTEMPTS")
                .default_value("15")
                .value_parser(clap::value_parser!(usize)),
        )
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("session-ttl-seconds")
                .long("session-ttl-seconds")
                .help("Session token TTL in seconds")
                .env("CUSTODE_SESSION_TTL_SECONDS")
                .default_value("1800")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("session-reap-seconds")
                .long("session-reap-seconds")
                .help("Interval between background sweeps of expired sessions")
                .env("CUSTODE_SESSION_REAP_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("kiosk-base-url")
                .long("kiosk-base-url")
                .help("Kiosk frontend base URL allowed by CORS")
                .env("CUSTODE_KIOSK_BASE_URL")
                .default_value("https://kiosk.custode.dev"),
        )
}

#[derive(Debug)]
pub struct Options {
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

impl Options {
    /// Collect PIN policy options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        let pepper = matches
            .get_one::<String>(ARG_PIN_PEPPER)
            .cloned()
            .context("missing required argument: --pin-pepper")?;
        let admin_key = matches
            .get_one::<String>(ARG_ADMIN_KEY)
            .cloned()
            .context("missing required argument: --admin-key")?;

        Ok(Self {
            pepper: SecretString::from(pepper),
            admin_key: SecretString::from(admin_key),
            max_attempts: matches
                .get_one::<u32>("pin-max-attempts")
                .copied()
                .unwrap_or(5),
            lockout_seconds: matches
                .get_one::<i64>("pin-lockout-seconds")
                .copied()
                .unwrap_or(900),
            verify_window_seconds: matches
                .get_one::<u64>("verify-window-seconds")
                .copied()
                .unwrap_or(300),
            verify_window_max_attempts: matches
                .get_one::<usize>("verify-window-max-attempts")
                .copied()
                .unwrap_or(15),
            session_ttl_seconds: matches
                .get_one::<u64>("session-ttl-seconds")
                .copied()
                .unwrap_or(1800),
            session_reap_seconds: matches
                .get_one::<u64>("session-reap-seconds")
                .copied()
                .unwrap_or(300),
            kiosk_base_url: matches
                .get_one::<String>("kiosk-base-url")
                .cloned()
                .unwrap_or_else(|| "https://kiosk.custode.dev".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn base_args() -> Vec<&'static str> {
        vec![
            "custode",
            "--dsn",
            "postgres://localhost/custode",
            "--pin-pepper",
            "pepper",
            "--admin-key",
            "admin-key",
        ]
    }

    #[test]
    fn options_defaults() -> Result<()> {
        temp_env::with_vars(
            [
                ("CUSTODE_PIN_MAX_ATTEMPTS", None::<&str>),
                ("CUSTODE_PIN_LOCKOUT_SECONDS", None::<&str>),
                ("CUSTODE_SESSION_TTL_SECONDS", None::<&str>),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(base_args());
                let options = Options::parse(&matches)?;
                assert_eq!(options.pepper.expose_secret(), "pepper");
                assert_eq!(options.admin_key.expose_secret(), "admin-key");
                assert_eq!(options.max_attempts, 5);
                assert_eq!(options.lockout_seconds, 900);
                assert_eq!(options.verify_window_seconds, 300);
                assert_eq!(options.verify_window_max_attempts, 15);
                assert_eq!(options.session_ttl_seconds, 1800);
                assert_eq!(options.session_reap_seconds, 300);
                assert_eq!(options.kiosk_base_url, "https://kiosk.custode.dev");
                Ok(())
            },
        )
    }

    #[test]
    fn options_overrides() -> Result<()> {
        let mut args = base_args();
        args.extend([
            "--pin-max-attempts",
            "3",
            "--pin-lockout-seconds",
            "60",
            "--verify-window-seconds",
            "30",
            "--verify-window-max-attempts",
            "2",
            "--session-ttl-seconds",
            "120",
            "--session-reap-seconds",
            "10",
            "--kiosk-base-url",
            "http://localhost:5173",
        ]);
        let matches = crate::cli::commands::new().get_matches_from(args);
        let options = Options::parse(&matches)?;
        assert_eq!(options.max_attempts, 3);
        assert_eq!(options.lockout_seconds, 60);
        assert_eq!(options.verify_window_seconds, 30);
        assert_eq!(options.verify_window_max_attempts, 2);
        assert_eq!(options.session_ttl_seconds, 120);
        assert_eq!(options.session_reap_seconds, 10);
        assert_eq!(options.kiosk_base_url, "http://localhost:5173");
        Ok(())
    }
}
