//! The authentication chain as axum middleware.
//!
//! Stages run in this order on protected routes: [`require_api_key`],
//! [`login`], [`require_session`], [`require_second_factor`]. Each one either
//! short-circuits with an [`AuthError`] or records what it learned in the
//! [`RequestContext`] and calls the next stage.
//!
//! Cookies are appended after the inner stages return, so a response keeps
//! the `apiKey`/`auth` cookies even when a later stage rejects it.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{
        header::{InvalidHeaderValue, AUTHORIZATION, SET_COOKIE},
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::Response,
};
use std::{net::SocketAddr, sync::Arc};
use tracing::{debug, warn};

use super::{
    context::RequestContext,
    credentials::{
        cookie, extract_api_key, Credential, API_KEY_COOKIE, SECOND_FACTOR_COOKIE, SESSION_COOKIE,
    },
    error::AuthError,
    second_factor::second_factor_gate,
    state::Authenticator,
};

/// Reject requests without the client application's API key.
///
/// # Errors
/// `MissingCredentials` when neither query nor cookie carry a key,
/// `InvalidCredentials` when it does not match.
pub async fn require_api_key(
    State(auth): State<Arc<Authenticator>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let credential = extract_api_key(request.uri().query(), request.headers())?;
    auth.check_api_key(&credential)?;

    let set_cookie = match &credential {
        Credential::ApiKey(key) => api_key_cookie(key).ok(),
        Credential::BasicAuth { .. } => None,
    };
    update_context(&mut request, |context| context.set_api_key(credential));

    let mut response = next.run(request).await;
    if let Some(value) = set_cookie {
        response.headers_mut().append(SET_COOKIE, value);
    }
    Ok(response)
}

/// Log in from an `Authorization: Basic` header when one is present.
///
/// Requests without the header pass through untouched.
///
/// # Errors
/// `InvalidCredentials` for a malformed header or wrong username/password,
/// `SessionCreation` if the new session cannot be stored.
pub async fn login(
    State(auth): State<Arc<Authenticator>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let header = match request.headers().get(AUTHORIZATION) {
        Some(value) => value
            .to_str()
            .map_err(|_| AuthError::InvalidCredentials)?
            .to_string(),
        None => String::new(),
    };
    if header.is_empty() {
        return Ok(next.run(request).await);
    }

    let ip = client_ip(&auth, &request);
    let (account, credential, token) = auth.login(&header, ip.as_deref()).await?;
    debug!(
        account_id = %account.id,
        staff = account.is_staff(),
        "logged in with basic credentials"
    );

    let set_cookie = session_cookie(&token, auth.config().session_ttl_seconds())
        .map_err(|err| AuthError::SessionCreation(err.into()))?;
    update_context(&mut request, |context| {
        context.set_login(credential, account, token);
    });

    let mut response = next.run(request).await;
    response.headers_mut().append(SET_COOKIE, set_cookie);
    Ok(response)
}

/// Resolve the session to an account.
///
/// A token issued by [`login`] earlier in the same request takes precedence
/// over the `auth` cookie.
///
/// # Errors
/// `MissingCredentials` without any token, `InvalidSession` when it does not
/// resolve, `Store` on storage failures.
pub async fn require_session(
    State(auth): State<Arc<Authenticator>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let fresh = request
        .extensions()
        .get::<RequestContext>()
        .and_then(|context| context.session_token().map(str::to_string));
    let token = fresh
        .or_else(|| cookie(request.headers(), SESSION_COOKIE).filter(|token| !token.is_empty()))
        .ok_or(AuthError::MissingCredentials)?;

    let ip = client_ip(&auth, &request);
    let account = auth.validate_session(&token, ip.as_deref()).await?;
    update_context(&mut request, |context| context.set_session(account, token));

    Ok(next.run(request).await)
}

/// Require the `twoFactorAuth` cookie for accounts with MFA enabled.
///
/// # Errors
/// `MissingCredentials` when no account was resolved, `SecondFactorRequired`
/// when the confirmation cookie is missing.
pub async fn require_second_factor(request: Request, next: Next) -> Result<Response, AuthError> {
    let confirmation = cookie(request.headers(), SECOND_FACTOR_COOKIE);
    let account = request
        .extensions()
        .get::<RequestContext>()
        .and_then(RequestContext::account);
    second_factor_gate(account.map(|account| &**account), confirmation.as_deref())?;

    Ok(next.run(request).await)
}

fn update_context(request: &mut Request, apply: impl FnOnce(&mut RequestContext)) {
    let mut context = request
        .extensions_mut()
        .remove::<RequestContext>()
        .unwrap_or_default();
    apply(&mut context);
    request.extensions_mut().insert(context);
}

fn api_key_cookie(key: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!("{API_KEY_COOKIE}={key}; Path=/")).inspect_err(|_| {
        warn!("api key cannot be echoed as a cookie");
    })
}

fn session_cookie(token: &str, ttl_seconds: i64) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; Max-Age={ttl_seconds}"
    ))
}

/// Address the session is bound to: a trusted proxy header, else the peer.
fn client_ip(auth: &Authenticator, request: &Request) -> Option<String> {
    if auth.config().trust_forwarded_for() {
        if let Some(ip) = forwarded_ip(request.headers()) {
            return Some(ip);
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthConfig, Argon2Verifier};
    use crate::store::{MemoryAccountStore, MemorySessionStore};
    use secrecy::SecretString;

    fn authenticator(trust: bool) -> Authenticator {
        Authenticator::new(
            AuthConfig::new(SecretString::from("key")).with_trust_forwarded_for(trust),
            Arc::new(MemoryAccountStore::new()),
            Arc::new(MemorySessionStore::new()),
            Arc::new(Argon2Verifier),
        )
    }

    fn request_from(peer: &str, forwarded: Option<&'static str>) -> Request {
        let mut request = Request::new(axum::body::Body::empty());
        if let Ok(addr) = peer.parse::<SocketAddr>() {
            request.extensions_mut().insert(ConnectInfo(addr));
        }
        if let Some(value) = forwarded {
            request
                .headers_mut()
                .insert("x-forwarded-for", HeaderValue::from_static(value));
        }
        request
    }

    #[test]
    fn client_ip_ignores_proxy_headers_unless_trusted() {
        let request = request_from("192.0.2.7:5555", Some("1.2.3.4, 5.6.7.8"));
        assert_eq!(
            client_ip(&authenticator(false), &request).as_deref(),
            Some("192.0.2.7")
        );
        assert_eq!(
            client_ip(&authenticator(true), &request).as_deref(),
            Some("1.2.3.4")
        );
    }

    #[test]
    fn client_ip_falls_back_to_peer_and_real_ip() {
        let request = request_from("[2001:db8::1]:443", None);
        assert_eq!(
            client_ip(&authenticator(true), &request).as_deref(),
            Some("2001:db8::1")
        );

        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(forwarded_ip(&headers).as_deref(), Some("9.9.9.9"));
        assert_eq!(forwarded_ip(&HeaderMap::new()), None);
    }

    #[test]
    fn cookies_are_well_formed() -> anyhow::Result<()> {
        let session = session_cookie("authcookie_abc", 86_400)?;
        assert_eq!(
            session.to_str()?,
            "auth=authcookie_abc; Path=/; HttpOnly; Max-Age=86400"
        );
        assert_eq!(api_key_cookie("k")?.to_str()?, "apiKey=k; Path=/");
        assert!(api_key_cookie("bad\nkey").is_err());
        Ok(())
    }

    #[test]
    fn update_context_preserves_earlier_fields() {
        let mut request = Request::new(axum::body::Body::empty());
        update_context(&mut request, |context| {
            context.set_api_key(Credential::ApiKey("k".to_string()));
        });
        update_context(&mut request, |context| {
            context.set_session(
                crate::store::Account::new("frank", "hash".to_string()),
                "tok".to_string(),
            );
        });
        let context = request.extensions().get::<RequestContext>();
        assert!(context.and_then(RequestContext::api_key).is_some());
        assert_eq!(
            context.and_then(RequestContext::session_token),
            Some("tok")
        );
    }
}
