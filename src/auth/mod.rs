//! Request authentication.
//!
//! An [`Authenticator`] holds the configuration and the stores; the
//! [`middleware`] functions wire it into an axum router as four stages that
//! share one [`RequestContext`] per request.

mod context;
mod credentials;
mod error;
pub mod middleware;
pub(crate) mod password;
mod second_factor;
mod session;
mod state;

pub use context::{CurrentAccount, RequestContext};
pub use credentials::{
    extract_api_key, parse_basic_auth, Credential, API_KEY_COOKIE, API_KEY_PARAM,
    SECOND_FACTOR_COOKIE, SESSION_COOKIE,
};
pub use error::AuthError;
pub use password::{hash_password, Argon2Verifier, PasswordVerifier};
pub use second_factor::{second_factor_gate, SecondFactorState};
pub use state::{AuthConfig, Authenticator, DEFAULT_SESSION_TTL_SECONDS};
