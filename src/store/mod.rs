//! Account and session storage consumed by the authenticator.
//!
//! The authenticator never creates accounts; it only reads them. Sessions are
//! keyed by the SHA-256 hash of the token so raw tokens never reach storage.

pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use memory::{MemoryAccountStore, MemorySessionStore};
pub use postgres::{PgAccountStore, PgSessionStore};

const STAFF_DEVELOPER_TYPE: &str = "internal";

/// User record owned by the account service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub password_hash: String,
    pub mfa_enabled: bool,
    pub developer_type: String,
    pub current_avatar_id: Option<String>,
    pub fallback_avatar_id: Option<String>,
    pub tags: Vec<String>,
}

impl Account {
    /// Build a regular (non-staff) account with a fresh `usr_` id.
    #[must_use]
    pub fn new(username: &str, password_hash: String) -> Self {
        Self {
            id: format!("usr_{}", Uuid::new_v4()),
            username: username.to_string(),
            display_name: username.to_string(),
            password_hash,
            mfa_enabled: false,
            developer_type: "none".to_string(),
            current_avatar_id: None,
            fallback_avatar_id: None,
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_mfa_enabled(mut self, enabled: bool) -> Self {
        self.mfa_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_developer_type(mut self, developer_type: &str) -> Self {
        self.developer_type = developer_type.to_string();
        self
    }

    #[must_use]
    pub fn is_staff(&self) -> bool {
        self.developer_type == STAFF_DEVELOPER_TYPE
    }
}

/// What a session token resolves to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub account_id: String,
    pub ip: Option<String>,
    pub issued_at_unix: i64,
    pub expires_at_unix: i64,
}

impl SessionRecord {
    /// A session is live strictly before its expiry instant.
    #[must_use]
    pub fn is_expired_at(&self, now_unix: i64) -> bool {
        now_unix >= self.expires_at_unix
    }
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Account>>;
    /// Liveness check used by `/health`.
    async fn ping(&self) -> Result<()>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn put(&self, token_hash: &[u8], record: SessionRecord) -> Result<()>;
    async fn get(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>>;
    async fn delete(&self, token_hash: &[u8]) -> Result<()>;
    /// Drop every session expired at `now_unix`, returning how many went.
    async fn purge_expired(&self, now_unix: i64) -> Result<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_new_defaults() {
        let account = Account::new("alice", "hash".to_string());
        assert!(account.id.starts_with("usr_"));
        assert_eq!(account.display_name, "alice");
        assert!(!account.mfa_enabled);
        assert!(!account.is_staff());
        assert!(account.with_developer_type("internal").is_staff());
    }

    #[test]
    fn session_expiry_is_exclusive() {
        let record = SessionRecord {
            account_id: "usr_1".to_string(),
            ip: None,
            issued_at_unix: 100,
            expires_at_unix: 200,
        };
        assert!(!record.is_expired_at(199));
        assert!(record.is_expired_at(200));
        assert!(record.is_expired_at(201));
    }
}
