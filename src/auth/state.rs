//! Authenticator configuration and the dependency struct shared by the
//! middleware.

use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::{credentials::Credential, error::AuthError, password::PasswordVerifier};
use crate::store::{AccountStore, SessionStore};

pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    api_key: SecretString,
    session_ttl_seconds: i64,
    bind_session_ip: bool,
    trust_forwarded_for: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            bind_session_ip: false,
            trust_forwarded_for: false,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    /// Reject sessions presented from an address other than the issuing one.
    #[must_use]
    pub fn with_bind_session_ip(mut self, bind: bool) -> Self {
        self.bind_session_ip = bind;
        self
    }

    /// Take the client address from `X-Forwarded-For`/`X-Real-IP`.
    /// Only safe behind a proxy that overwrites those headers.
    #[must_use]
    pub fn with_trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn bind_session_ip(&self) -> bool {
        self.bind_session_ip
    }

    #[must_use]
    pub fn trust_forwarded_for(&self) -> bool {
        self.trust_forwarded_for
    }
}

/// Config plus collaborators, built once at startup.
pub struct Authenticator {
    config: AuthConfig,
    accounts: Arc<dyn AccountStore>,
    sessions: Arc<dyn SessionStore>,
    passwords: Arc<dyn PasswordVerifier>,
}

impl Authenticator {
    pub fn new(
        config: AuthConfig,
        accounts: Arc<dyn AccountStore>,
        sessions: Arc<dyn SessionStore>,
        passwords: Arc<dyn PasswordVerifier>,
    ) -> Self {
        Self {
            config,
            accounts,
            sessions,
            passwords,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn accounts(&self) -> &dyn AccountStore {
        self.accounts.as_ref()
    }

    pub(super) fn sessions(&self) -> &dyn SessionStore {
        self.sessions.as_ref()
    }

    pub(super) fn passwords(&self) -> &dyn PasswordVerifier {
        self.passwords.as_ref()
    }

    /// Compare a presented API key against the configured shared secret.
    ///
    /// # Errors
    /// `InvalidCredentials` on mismatch, `MissingCredentials` if handed a
    /// non API-key credential.
    pub fn check_api_key(&self, credential: &Credential) -> Result<(), AuthError> {
        let Credential::ApiKey(presented) = credential else {
            return Err(AuthError::MissingCredentials);
        };
        if constant_time_eq(presented, self.config.api_key.expose_secret()) {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

/// Digest both sides first so the comparison length never depends on input.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = Sha256::digest(a.as_bytes());
    let b = Sha256::digest(b.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::Argon2Verifier;
    use crate::store::{MemoryAccountStore, MemorySessionStore};

    fn authenticator(key: &str) -> Authenticator {
        Authenticator::new(
            AuthConfig::new(SecretString::from(key)),
            Arc::new(MemoryAccountStore::new()),
            Arc::new(MemorySessionStore::new()),
            Arc::new(Argon2Verifier),
        )
    }

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new(SecretString::from("key"));
        assert_eq!(config.session_ttl_seconds(), DEFAULT_SESSION_TTL_SECONDS);
        assert!(!config.bind_session_ip());
        assert!(!config.trust_forwarded_for());

        let config = config
            .with_session_ttl_seconds(60)
            .with_bind_session_ip(true)
            .with_trust_forwarded_for(true);
        assert_eq!(config.session_ttl_seconds(), 60);
        assert!(config.bind_session_ip());
        assert!(config.trust_forwarded_for());
    }

    #[test]
    fn api_key_must_match_configured_secret() {
        let auth = authenticator("JlE5Jldo5Jibnk5O5hTx6XVqsJu4WJ26");
        assert!(auth
            .check_api_key(&Credential::ApiKey(
                "JlE5Jldo5Jibnk5O5hTx6XVqsJu4WJ26".to_string()
            ))
            .is_ok());
        assert!(matches!(
            auth.check_api_key(&Credential::ApiKey("nope".to_string())),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.check_api_key(&Credential::ApiKey(String::new())),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn constant_time_eq_matches_plain_equality() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(constant_time_eq("", ""));
    }
}
