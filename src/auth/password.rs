//! Password hash verification.
//!
//! Hashes are Argon2id PHC strings, so algorithm parameters and salt travel
//! with the hash itself.

use anyhow::{anyhow, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, SaltString};
use argon2::{Argon2, PasswordVerifier as _};

pub trait PasswordVerifier: Send + Sync {
    /// `Ok(false)` on mismatch; `Err` only when the stored hash is unusable.
    ///
    /// # Errors
    /// Returns an error if `hash` cannot be parsed.
    fn verify(&self, plain: &str, hash: &str) -> Result<bool>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Argon2Verifier;

impl PasswordVerifier for Argon2Verifier {
    fn verify(&self, plain: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash).map_err(|err| anyhow!("invalid password hash: {err}"))?;
        match Argon2::default().verify_password(plain.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(err) => Err(anyhow!("password verification failed: {err}")),
        }
    }
}

/// Hash a plaintext password into an Argon2id PHC string.
///
/// # Errors
/// Returns an error if hashing fails.
pub fn hash_password(plain: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash password: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() -> Result<()> {
        let hash = hash_password("correct horse")?;
        assert!(hash.starts_with("$argon2id$"));
        assert!(Argon2Verifier.verify("correct horse", &hash)?);
        assert!(!Argon2Verifier.verify("wrong horse", &hash)?);
        Ok(())
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(Argon2Verifier.verify("anything", "not-a-phc-string").is_err());
    }
}
