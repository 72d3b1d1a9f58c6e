use crate::{api, auth::AuthConfig};
use anyhow::Result;
use secrecy::SecretString;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub api_key: SecretString,
    pub session_ttl_seconds: i64,
    pub session_bind_ip: bool,
    pub trust_forwarded_for: bool,
}

impl Args {
    #[must_use]
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(self.api_key.clone())
            .with_session_ttl_seconds(self.session_ttl_seconds)
            .with_bind_session_ip(self.session_bind_ip)
            .with_trust_forwarded_for(self.trust_forwarded_for)
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = args.auth_config();

    debug!(
        session_ttl_seconds = auth_config.session_ttl_seconds(),
        bind_session_ip = auth_config.bind_session_ip(),
        trust_forwarded_for = auth_config.trust_forwarded_for(),
        "auth config"
    );

    api::new(args.port, args.dsn, auth_config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_config_from_args() {
        let args = Args {
            port: 8080,
            dsn: "postgres://localhost/shoya".to_string(),
            api_key: SecretString::from("key"),
            session_ttl_seconds: 3600,
            session_bind_ip: true,
            trust_forwarded_for: false,
        };
        let config = args.auth_config();
        assert_eq!(config.session_ttl_seconds(), 3600);
        assert!(config.bind_session_ip());
        assert!(!config.trust_forwarded_for());
    }

    #[test]
    fn debug_hides_api_key() {
        let args = Args {
            port: 8080,
            dsn: "postgres://localhost/shoya".to_string(),
            api_key: SecretString::from("super-secret-key"),
            session_ttl_seconds: 3600,
            session_bind_ip: false,
            trust_forwarded_for: false,
        };
        assert!(!format!("{args:?}").contains("super-secret-key"));
    }
}
