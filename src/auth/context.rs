//! Typed per-request authentication state.

use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

use super::{credentials::Credential, error::AuthError};
use crate::store::Account;

/// What the chain has learned about the request so far.
///
/// Stages only fill fields in; nothing is ever cleared, and the account is
/// resolved at most once per request identity.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    api_key: Option<Credential>,
    credential: Option<Credential>,
    account: Option<Arc<Account>>,
    session_token: Option<String>,
}

impl RequestContext {
    pub(crate) fn set_api_key(&mut self, credential: Credential) {
        self.api_key.get_or_insert(credential);
    }

    /// Record a login: the credential used and the session it produced.
    pub(crate) fn set_login(&mut self, credential: Credential, account: Account, token: String) {
        self.credential.get_or_insert(credential);
        self.account = Some(Arc::new(account));
        self.session_token = Some(token);
    }

    /// Record the account a session token resolved to.
    pub(crate) fn set_session(&mut self, account: Account, token: String) {
        self.account = Some(Arc::new(account));
        self.session_token.get_or_insert(token);
    }

    #[must_use]
    pub fn api_key(&self) -> Option<&Credential> {
        self.api_key.as_ref()
    }

    #[must_use]
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    #[must_use]
    pub fn account(&self) -> Option<&Arc<Account>> {
        self.account.as_ref()
    }

    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }
}

/// The account resolved by the chain, for handlers behind it.
#[derive(Clone, Debug)]
pub struct CurrentAccount {
    pub account: Arc<Account>,
    pub session_token: String,
}

impl<S> FromRequestParts<S> for CurrentAccount
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let context = parts
            .extensions
            .get::<RequestContext>()
            .ok_or(AuthError::MissingCredentials)?;
        match (context.account(), context.session_token()) {
            (Some(account), Some(token)) => Ok(Self {
                account: account.clone(),
                session_token: token.to_string(),
            }),
            _ => Err(AuthError::MissingCredentials),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn login_then_session_keeps_fresh_token() {
        let account = Account::new("dave", "hash".to_string());
        let mut context = RequestContext::default();
        context.set_api_key(Credential::ApiKey("k".to_string()));
        context.set_login(
            Credential::BasicAuth {
                username: "dave".to_string(),
                password: "pw".to_string(),
            },
            account.clone(),
            "fresh".to_string(),
        );
        context.set_session(account.clone(), "fresh".to_string());

        assert_eq!(context.session_token(), Some("fresh"));
        assert_eq!(context.account().map(|a| a.id.as_str()), Some(account.id.as_str()));
        assert!(context.credential().is_some());
        assert!(context.api_key().is_some());
    }

    #[test]
    fn api_key_is_set_once() {
        let mut context = RequestContext::default();
        context.set_api_key(Credential::ApiKey("first".to_string()));
        context.set_api_key(Credential::ApiKey("second".to_string()));
        assert_eq!(
            context.api_key(),
            Some(&Credential::ApiKey("first".to_string()))
        );
    }

    #[tokio::test]
    async fn current_account_requires_resolved_context() {
        let (mut parts, ()) = Request::new(()).into_parts();
        assert!(matches!(
            CurrentAccount::from_request_parts(&mut parts, &()).await,
            Err(AuthError::MissingCredentials)
        ));

        let account = Account::new("erin", "hash".to_string());
        let mut context = RequestContext::default();
        context.set_session(account.clone(), "tok".to_string());
        parts.extensions.insert(context);
        let current = CurrentAccount::from_request_parts(&mut parts, &()).await;
        assert_eq!(current.ok().map(|c| c.account.id.clone()), Some(account.id));
    }
}
