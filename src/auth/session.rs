//! Session issuance and validation.
//!
//! Only the SHA-256 hash of a token reaches the session store; the raw value
//! exists in the `auth` cookie and the request context.

use anyhow::{Context, Result};
use base64::Engine;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use super::{
    credentials::{parse_basic_auth, Credential},
    error::AuthError,
    state::Authenticator,
};
use crate::store::{Account, SessionRecord};

const TOKEN_PREFIX: &str = "authcookie_";

/// Create a new opaque session token.
pub(crate) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(format!(
        "{TOKEN_PREFIX}{}",
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    ))
}

pub(crate) fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

pub(crate) fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

impl Authenticator {
    /// Verify a Basic `Authorization` header and issue a session for it.
    ///
    /// # Errors
    /// `InvalidCredentials` for a malformed header, unknown user or wrong
    /// password; `SessionCreation` if the session cannot be stored.
    pub async fn login(
        &self,
        authorization: &str,
        ip: Option<&str>,
    ) -> Result<(Account, Credential, String), AuthError> {
        let credential = parse_basic_auth(authorization)?;
        let Credential::BasicAuth { username, password } = &credential else {
            return Err(AuthError::InvalidCredentials);
        };

        let account = self
            .accounts()
            .find_by_username(username)
            .await
            .map_err(AuthError::Store)?
            .ok_or_else(|| {
                debug!("login for unknown username");
                AuthError::InvalidCredentials
            })?;

        match self.passwords().verify(password, &account.password_hash) {
            Ok(true) => {}
            Ok(false) => return Err(AuthError::InvalidCredentials),
            Err(err) => {
                warn!(account_id = %account.id, "unusable password hash: {err:#}");
                return Err(AuthError::InvalidCredentials);
            }
        }

        let token = self.issue_session(&account, ip).await?;
        Ok((account, credential, token))
    }

    /// Persist a new session for `account` and return its raw token.
    ///
    /// # Errors
    /// `SessionCreation` when token generation or the store fails.
    pub async fn issue_session(
        &self,
        account: &Account,
        ip: Option<&str>,
    ) -> Result<String, AuthError> {
        self.issue_session_at(account, ip, now_unix_seconds()).await
    }

    pub(crate) async fn issue_session_at(
        &self,
        account: &Account,
        ip: Option<&str>,
        now_unix: i64,
    ) -> Result<String, AuthError> {
        let token = generate_session_token().map_err(AuthError::SessionCreation)?;
        let record = SessionRecord {
            account_id: account.id.clone(),
            ip: ip.map(str::to_string),
            issued_at_unix: now_unix,
            expires_at_unix: now_unix.saturating_add(self.config().session_ttl_seconds()),
        };
        self.sessions()
            .put(&hash_session_token(&token), record)
            .await
            .map_err(AuthError::SessionCreation)?;
        debug!(account_id = %account.id, "session issued");

        match self.sessions().purge_expired(now_unix).await {
            Ok(0) => {}
            Ok(purged) => debug!(purged, "purged expired sessions"),
            Err(err) => warn!("failed to purge expired sessions: {err:#}"),
        }
        Ok(token)
    }

    /// Resolve a session token to its account.
    ///
    /// # Errors
    /// `InvalidSession` when the token is unknown, expired, presented from a
    /// different address while IP binding is on, or its account is gone.
    /// `Store` on storage failures.
    pub async fn validate_session(
        &self,
        token: &str,
        ip: Option<&str>,
    ) -> Result<Account, AuthError> {
        self.validate_session_at(token, ip, now_unix_seconds()).await
    }

    pub(crate) async fn validate_session_at(
        &self,
        token: &str,
        ip: Option<&str>,
        now_unix: i64,
    ) -> Result<Account, AuthError> {
        if token.is_empty() {
            return Err(AuthError::InvalidSession);
        }

        let token_hash = hash_session_token(token);
        let record = self
            .sessions()
            .get(&token_hash)
            .await
            .map_err(AuthError::Store)?
            .ok_or(AuthError::InvalidSession)?;

        if record.is_expired_at(now_unix) {
            debug!(account_id = %record.account_id, "session expired");
            if let Err(err) = self.sessions().delete(&token_hash).await {
                warn!("failed to delete expired session: {err:#}");
            }
            return Err(AuthError::InvalidSession);
        }

        if self.config().bind_session_ip() && record.ip.as_deref() != ip {
            debug!(account_id = %record.account_id, "session presented from another address");
            return Err(AuthError::InvalidSession);
        }

        self.accounts()
            .find_by_id(&record.account_id)
            .await
            .map_err(AuthError::Store)?
            .ok_or(AuthError::InvalidSession)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{password::hash_password, AuthConfig, Argon2Verifier};
    use crate::store::{MemoryAccountStore, MemorySessionStore, SessionStore};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
    use secrecy::SecretString;
    use std::sync::Arc;

    const DAY: i64 = 24 * 60 * 60;
    const T0: i64 = 1_700_000_000;

    struct Fixture {
        auth: Authenticator,
        accounts: Arc<MemoryAccountStore>,
        sessions: Arc<MemorySessionStore>,
        account: Account,
    }

    async fn fixture(config: AuthConfig) -> anyhow::Result<Fixture> {
        let accounts = Arc::new(MemoryAccountStore::new());
        let account = Account::new("alice", hash_password("hunter22")?);
        accounts.insert(account.clone()).await;
        let sessions = Arc::new(MemorySessionStore::new());
        let auth = Authenticator::new(
            config,
            accounts.clone(),
            sessions.clone(),
            Arc::new(Argon2Verifier),
        );
        Ok(Fixture {
            auth,
            accounts,
            sessions,
            account,
        })
    }

    fn config() -> AuthConfig {
        AuthConfig::new(SecretString::from("key"))
    }

    fn basic(raw: &str) -> String {
        format!("Basic {}", STANDARD.encode(raw))
    }

    #[test]
    fn generated_tokens_are_prefixed_and_unique() -> anyhow::Result<()> {
        let first = generate_session_token()?;
        let second = generate_session_token()?;
        assert_ne!(first, second);
        let raw = first
            .strip_prefix(TOKEN_PREFIX)
            .ok_or_else(|| anyhow!("missing prefix"))?;
        assert_eq!(URL_SAFE_NO_PAD.decode(raw)?.len(), 32);
        Ok(())
    }

    #[test]
    fn hash_session_token_stable() {
        assert_eq!(hash_session_token("a"), hash_session_token("a"));
        assert_ne!(hash_session_token("a"), hash_session_token("b"));
    }

    #[tokio::test]
    async fn unknown_token_is_invalid_session() -> anyhow::Result<()> {
        let f = fixture(config()).await?;
        for token in ["", "authcookie_forged", "random"] {
            assert!(matches!(
                f.auth.validate_session(token, None).await,
                Err(AuthError::InvalidSession)
            ));
        }
        Ok(())
    }

    #[tokio::test]
    async fn session_lives_exactly_one_day() -> anyhow::Result<()> {
        let f = fixture(config()).await?;
        let token = f.auth.issue_session_at(&f.account, None, T0).await?;

        let ok = f.auth.validate_session_at(&token, None, T0 + DAY - 1).await?;
        assert_eq!(ok.id, f.account.id);

        assert!(matches!(
            f.auth.validate_session_at(&token, None, T0 + DAY).await,
            Err(AuthError::InvalidSession)
        ));
        assert!(matches!(
            f.auth.validate_session_at(&token, None, T0 + DAY + 1).await,
            Err(AuthError::InvalidSession)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn expired_session_is_removed_on_lookup() -> anyhow::Result<()> {
        let f = fixture(config()).await?;
        let token = f.auth.issue_session_at(&f.account, None, T0).await?;
        assert_eq!(f.sessions.len().await, 1);

        assert!(matches!(
            f.auth.validate_session_at(&token, None, T0 + DAY).await,
            Err(AuthError::InvalidSession)
        ));
        assert!(f.sessions.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn issuing_purges_expired_sessions() -> anyhow::Result<()> {
        let f = fixture(config()).await?;
        for offset in 0..6 {
            f.auth.issue_session_at(&f.account, None, T0 + offset).await?;
        }
        assert_eq!(f.sessions.len().await, 6);

        let fresh = f.auth.issue_session_at(&f.account, None, T0 + DAY + 3).await?;
        assert_eq!(f.sessions.len().await, 3);
        assert!(f
            .auth
            .validate_session_at(&fresh, None, T0 + DAY + 3)
            .await
            .is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn ip_binding_is_opt_in() -> anyhow::Result<()> {
        let loose = fixture(config()).await?;
        let token = loose.auth.issue_session(&loose.account, Some("10.0.0.1")).await?;
        assert!(loose.auth.validate_session(&token, Some("10.0.0.2")).await.is_ok());

        let strict = fixture(config().with_bind_session_ip(true)).await?;
        let token = strict
            .auth
            .issue_session(&strict.account, Some("10.0.0.1"))
            .await?;
        assert!(strict.auth.validate_session(&token, Some("10.0.0.1")).await.is_ok());
        assert!(matches!(
            strict.auth.validate_session(&token, Some("10.0.0.2")).await,
            Err(AuthError::InvalidSession)
        ));
        assert!(matches!(
            strict.auth.validate_session(&token, None).await,
            Err(AuthError::InvalidSession)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn vanished_account_invalidates_session() -> anyhow::Result<()> {
        let f = fixture(config()).await?;
        let token = f.auth.issue_session(&f.account, None).await?;
        f.accounts.remove(&f.account.id).await;
        assert!(matches!(
            f.auth.validate_session(&token, None).await,
            Err(AuthError::InvalidSession)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn login_issues_a_session_for_the_same_account() -> anyhow::Result<()> {
        let f = fixture(config()).await?;
        let (account, credential, token) =
            f.auth.login(&basic("alice:hunter22"), Some("127.0.0.1")).await?;
        assert_eq!(account.id, f.account.id);
        assert!(matches!(credential, Credential::BasicAuth { .. }));
        assert!(!token.is_empty());

        let resolved = f.auth.validate_session(&token, Some("127.0.0.1")).await?;
        assert_eq!(resolved.id, f.account.id);
        Ok(())
    }

    #[tokio::test]
    async fn login_with_wrong_password_or_user_is_invalid() -> anyhow::Result<()> {
        let f = fixture(config()).await?;
        for header in [basic("alice:wrong"), basic("mallory:hunter22"), basic("alice:")] {
            assert!(matches!(
                f.auth.login(&header, None).await,
                Err(AuthError::InvalidCredentials)
            ));
        }
        Ok(())
    }

    #[tokio::test]
    async fn login_with_broken_hash_is_invalid() -> anyhow::Result<()> {
        let f = fixture(config()).await?;
        f.accounts
            .insert(Account::new("bob", "plaintext?".to_string()))
            .await;
        assert!(matches!(
            f.auth.login(&basic("bob:plaintext?"), None).await,
            Err(AuthError::InvalidCredentials)
        ));
        Ok(())
    }

    struct FailingSessions;

    #[async_trait]
    impl SessionStore for FailingSessions {
        async fn put(&self, _token_hash: &[u8], _record: SessionRecord) -> anyhow::Result<()> {
            Err(anyhow!("session store unavailable"))
        }

        async fn get(&self, _token_hash: &[u8]) -> anyhow::Result<Option<SessionRecord>> {
            Err(anyhow!("session store unavailable"))
        }

        async fn delete(&self, _token_hash: &[u8]) -> anyhow::Result<()> {
            Err(anyhow!("session store unavailable"))
        }

        async fn purge_expired(&self, _now_unix: i64) -> anyhow::Result<u64> {
            Err(anyhow!("session store unavailable"))
        }
    }

    #[tokio::test]
    async fn store_failures_are_internal() -> anyhow::Result<()> {
        let accounts = Arc::new(MemoryAccountStore::new());
        let account = Account::new("alice", hash_password("hunter22")?);
        accounts.insert(account.clone()).await;
        let auth = Authenticator::new(
            config(),
            accounts,
            Arc::new(FailingSessions),
            Arc::new(Argon2Verifier),
        );

        assert!(matches!(
            auth.login(&basic("alice:hunter22"), None).await,
            Err(AuthError::SessionCreation(_))
        ));
        assert!(matches!(
            auth.validate_session("authcookie_x", None).await,
            Err(AuthError::Store(_))
        ));
        Ok(())
    }
}
