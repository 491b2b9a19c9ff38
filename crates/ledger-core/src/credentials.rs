//! Credential checking and derivation.
//!
//! Account private keys are never stored in the clear. The store holds a
//! salted one-way hash and the salt it was produced with; the transfer path
//! only ever asks two questions of the scheme, through [`CredentialScheme`].

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

/// A stored credential and the salt it was hashed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedCredential {
    pub credential: String,
    pub salt: String,
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to hash credential: {0}")]
    Hash(String),
}

/// Injected credential capability.
///
/// Implementations must be deterministic for a given salt, salted, and
/// one-way.
pub trait CredentialScheme: Send + Sync {
    /// Does `claimed` hash to `stored` under `salt`?
    fn verify(&self, claimed: &str, stored: &str, salt: &str) -> bool;

    /// Hashes `source` under a fresh salt.
    fn derive(&self, source: &str) -> Result<DerivedCredential, CredentialError>;
}

/// Argon2id with default parameters, PHC string encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Scheme;

impl CredentialScheme for Argon2Scheme {
    fn verify(&self, claimed: &str, stored: &str, salt: &str) -> bool {
        let parsed = match PasswordHash::new(stored) {
            Ok(h) => h,
            Err(_) => return false,
        };

        // The salt column must agree with the salt embedded in the hash.
        if parsed.salt.map(|s| s.as_str()) != Some(salt) {
            return false;
        }

        Argon2::default()
            .verify_password(claimed.as_bytes(), &parsed)
            .is_ok()
    }

    fn derive(&self, source: &str) -> Result<DerivedCredential, CredentialError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(source.as_bytes(), &salt)
            .map_err(|e| CredentialError::Hash(e.to_string()))?;

        Ok(DerivedCredential {
            credential: hash.to_string(),
            salt: salt.as_str().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_then_verify() {
        let scheme = Argon2Scheme;
        let derived = scheme.derive("s3cret").unwrap();

        assert!(scheme.verify("s3cret", &derived.credential, &derived.salt));
        assert!(!scheme.verify("wrong", &derived.credential, &derived.salt));
        assert!(!derived.credential.contains("s3cret"));
    }

    #[test]
    fn test_salt_column_must_match() {
        let scheme = Argon2Scheme;
        let a = scheme.derive("s3cret").unwrap();
        let b = scheme.derive("s3cret").unwrap();

        assert_ne!(a.salt, b.salt);
        assert!(!scheme.verify("s3cret", &a.credential, &b.salt));
    }

    #[test]
    fn test_garbage_stored_credential_never_verifies() {
        assert!(!Argon2Scheme.verify("x", "not-a-phc-string", "salt"));
        assert!(!Argon2Scheme.verify("", "", ""));
    }
}
