//! Map parsed CLI arguments to an [`Action`].

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, ARG_DSN, ARG_PORT};
use anyhow::{Context, Result};
use url::Url;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    Url::parse(&dsn).context("invalid --dsn, expected a URL")?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        api_key: auth_opts.api_key,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        session_bind_ip: auth_opts.session_bind_ip,
        trust_forwarded_for: auth_opts.trust_forwarded_for,
    }))
}
