//! Client secret and user password hashing.
//!
//! Secrets are never stored in plaintext. Registries hold Argon2id PHC
//! strings produced by [`hash_secret`] and check presented values with
//! [`verify_secret`].
//!
//! # Example
//!
//! ```
//! use tessera_auth::secret::{generate_client_secret, hash_secret, verify_secret};
//!
//! let secret = generate_client_secret();
//! let hash = hash_secret(&secret).unwrap();
//!
//! assert!(verify_secret(&secret, &hash).unwrap());
//! assert!(!verify_secret("wrong", &hash).unwrap());
//! ```

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;

use crate::error::AuthError;

/// Errors raised while hashing or checking a secret.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    /// The stored value is not a valid PHC hash string.
    #[error("Malformed secret hash: {0}")]
    MalformedHash(String),

    /// Hashing failed.
    #[error("Failed to hash secret: {0}")]
    Hashing(String),
}

impl From<SecretError> for AuthError {
    fn from(err: SecretError) -> Self {
        AuthError::internal(err.to_string())
    }
}

/// Generate a new random client secret (256 bits, base64url encoded).
#[must_use]
pub fn generate_client_secret() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a secret with Argon2id and a random salt.
///
/// # Errors
///
/// Returns `SecretError::Hashing` if Argon2 rejects the input.
pub fn hash_secret(secret: &str) -> Result<String, SecretError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| SecretError::Hashing(e.to_string()))
}

/// Verify a secret against a stored Argon2 hash.
///
/// Returns `Ok(false)` on mismatch.
///
/// # Errors
///
/// Returns `SecretError::MalformedHash` only if the stored hash cannot be parsed.
pub fn verify_secret(secret: &str, hash: &str) -> Result<bool, SecretError> {
    let parsed = PasswordHash::new(hash).map_err(|e| SecretError::MalformedHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_client_secret() {
        let secret = generate_client_secret();
        assert_eq!(secret.len(), 43);
        assert_ne!(secret, generate_client_secret());
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_secret("s3cret").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_secret("s3cret", &hash).unwrap());
        assert!(!verify_secret("other", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_secret("same").unwrap();
        let b = hash_secret("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash() {
        let result = verify_secret("x", "not-a-phc-string");
        assert!(matches!(result, Err(SecretError::MalformedHash(_))));
    }
}
