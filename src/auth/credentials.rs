//! Credential extraction from query strings, cookies and the `Authorization`
//! header.

use axum::http::{header::COOKIE, HeaderMap};
use base64::Engine;
use std::fmt;

use super::error::AuthError;

pub const API_KEY_PARAM: &str = "apiKey";
pub const API_KEY_COOKIE: &str = "apiKey";
pub const SESSION_COOKIE: &str = "auth";
pub const SECOND_FACTOR_COOKIE: &str = "twoFactorAuth";

/// Per-request credential material. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    ApiKey(String),
    BasicAuth { username: String, password: String },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey(_) => f.debug_tuple("ApiKey").field(&"***").finish(),
            Self::BasicAuth { username, .. } => f
                .debug_struct("BasicAuth")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// Pick the API key: query parameter first, cookie second.
///
/// Empty values count as absent.
///
/// # Errors
/// Returns `MissingCredentials` when neither source carries a key.
pub fn extract_api_key(query: Option<&str>, headers: &HeaderMap) -> Result<Credential, AuthError> {
    query
        .and_then(|query| query_param(query, API_KEY_PARAM))
        .filter(|key| !key.is_empty())
        .or_else(|| cookie(headers, API_KEY_COOKIE).filter(|key| !key.is_empty()))
        .map(Credential::ApiKey)
        .ok_or(AuthError::MissingCredentials)
}

/// Parse an `Authorization: Basic <base64>` header value.
///
/// Username and password are each query-unescaped after splitting on the
/// first colon, so passwords may contain `:`.
///
/// # Errors
/// Any malformed input is `InvalidCredentials`; the caller only invokes this
/// when a header is present.
pub fn parse_basic_auth(header: &str) -> Result<Credential, AuthError> {
    let (scheme, payload) = header
        .split_once(' ')
        .ok_or(AuthError::InvalidCredentials)?;
    if scheme != "Basic" {
        return Err(AuthError::InvalidCredentials);
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|_| AuthError::InvalidCredentials)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::InvalidCredentials)?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or(AuthError::InvalidCredentials)?;

    Ok(Credential::BasicAuth {
        username: query_unescape(username).ok_or(AuthError::InvalidCredentials)?,
        password: query_unescape(password).ok_or(AuthError::InvalidCredentials)?,
    })
}

/// Form-style unescape: `+` is a space and every `%` must be followed by two
/// hex digits. Returns `None` on malformed escapes or non UTF-8 output.
pub(crate) fn query_unescape(value: &str) -> Option<String> {
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let well_formed = bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit);
            if !well_formed {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    let spaced = value.replace('+', " ");
    urlencoding::decode(&spaced).ok().map(|s| s.into_owned())
}

/// Value of the first query parameter named `name`, form-decoded.
pub(crate) fn query_param(query: &str, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// Value of the first cookie named `name` across all `Cookie` headers.
pub fn cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| val.trim().to_string())
        })
}
