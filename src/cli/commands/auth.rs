use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

use crate::auth::DEFAULT_SESSION_TTL_SECONDS;

pub const ARG_API_KEY: &str = "api-key";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_BIND_IP: &str = "session-bind-ip";
pub const ARG_TRUST_FORWARDED_FOR: &str = "trust-forwarded-for";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_API_KEY)
                .long(ARG_API_KEY)
                .help("Client application API key expected in the apiKey query parameter or cookie")
                .env("SHOYA_API_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("SHOYA_SESSION_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_SESSION_BIND_IP)
                .long(ARG_SESSION_BIND_IP)
                .help("Reject sessions presented from a different client address than the one that logged in")
                .env("SHOYA_SESSION_BIND_IP")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_TRUST_FORWARDED_FOR)
                .long(ARG_TRUST_FORWARDED_FOR)
                .help("Take the client address from X-Forwarded-For/X-Real-IP (only behind a trusted proxy)")
                .env("SHOYA_TRUST_FORWARDED_FOR")
                .action(ArgAction::SetTrue),
        )
}

#[derive(Debug)]
pub struct Options {
    pub api_key: SecretString,
    pub session_ttl_seconds: i64,
    pub session_bind_ip: bool,
    pub trust_forwarded_for: bool,
}

impl Options {
    /// # Errors
    /// Returns an error if the API key is missing or empty, or the TTL is not positive.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let api_key = matches
            .get_one::<String>(ARG_API_KEY)
            .filter(|key| !key.is_empty())
            .cloned()
            .context("missing required argument: --api-key")?;

        let session_ttl_seconds = matches
            .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
            .copied()
            .unwrap_or(DEFAULT_SESSION_TTL_SECONDS);
        if session_ttl_seconds <= 0 {
            return Err(anyhow!("--{ARG_SESSION_TTL_SECONDS} must be greater than 0"));
        }

        Ok(Self {
            api_key: SecretString::from(api_key),
            session_ttl_seconds,
            session_bind_ip: matches.get_flag(ARG_SESSION_BIND_IP),
            trust_forwarded_for: matches.get_flag(ARG_TRUST_FORWARDED_FOR),
        })
    }
}
