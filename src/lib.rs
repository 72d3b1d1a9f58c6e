//! # Shoya (social VR platform API server)
//!
//! `shoya` serves a REST surface compatible with a social VR platform's
//! client API. This crate hosts the request authenticator that guards every
//! resource route, plus the HTTP service and CLI that run it.
//!
//! ## Authentication chain
//!
//! Every protected route runs the same short chain of middleware:
//!
//! 1. **API key**: the client application's shared secret, read from the
//!    `apiKey` query parameter or cookie.
//! 2. **Login** (optional): an `Authorization: Basic` header is verified
//!    against the account store and a new session is issued as the `auth`
//!    cookie.
//! 3. **Session**: the `auth` token (fresh from step 2, else the cookie) is
//!    exchanged for the account.
//! 4. **Second factor**: accounts with MFA enabled must present a
//!    `twoFactorAuth` cookie.
//!
//! Rejections use a fixed JSON envelope,
//! `{"error":{"message":..,"status_code":..}}`, that clients rely on.

pub mod api;
pub mod auth;
pub mod cli;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
