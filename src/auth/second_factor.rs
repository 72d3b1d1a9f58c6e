//! Second-factor gate.
//!
//! The confirmation cookie is only checked for presence. There is no
//! enrollment or verification endpoint yet, so any non-empty value passes.

use super::error::AuthError;
use crate::store::Account;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SecondFactorState {
    NoAccount,
    MfaDisabled,
    MfaEnabledUnconfirmed,
    MfaEnabledConfirmed,
}

impl SecondFactorState {
    #[must_use]
    pub fn resolve(account: Option<&Account>, confirmation: Option<&str>) -> Self {
        match account {
            None => Self::NoAccount,
            Some(account) if !account.mfa_enabled => Self::MfaDisabled,
            Some(_) if confirmation.is_some_and(|value| !value.is_empty()) => {
                Self::MfaEnabledConfirmed
            }
            Some(_) => Self::MfaEnabledUnconfirmed,
        }
    }
}

/// Let the request through or name the missing piece.
///
/// # Errors
/// `MissingCredentials` without an account, `SecondFactorRequired` when MFA
/// is enabled and no confirmation cookie was presented.
pub fn second_factor_gate(
    account: Option<&Account>,
    confirmation: Option<&str>,
) -> Result<(), AuthError> {
    match SecondFactorState::resolve(account, confirmation) {
        SecondFactorState::NoAccount => Err(AuthError::MissingCredentials),
        SecondFactorState::MfaEnabledUnconfirmed => Err(AuthError::SecondFactorRequired),
        SecondFactorState::MfaDisabled | SecondFactorState::MfaEnabledConfirmed => Ok(()),
    }
}
