use thiserror::Error;

/// Why the chain rejected a request.
///
/// Every credential problem is a 401; the variant only matters for client
/// diagnostics and logging. Internal variants keep their cause for the logs
/// and never expose it in the response body.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credential material at all.
    #[error("missing credentials")]
    MissingCredentials,
    /// Credential material present but malformed or wrong.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Session token unknown, expired or bound to another address.
    #[error("invalid session")]
    InvalidSession,
    #[error("second factor required")]
    SecondFactorRequired,
    #[error("failed to create session: {0:#}")]
    SessionCreation(#[source] anyhow::Error),
    #[error("store failure: {0:#}")]
    Store(#[source] anyhow::Error),
}

impl AuthError {
    /// Whether this is a server-side failure rather than a client rejection.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::SessionCreation(_) | Self::Store(_))
    }
}
