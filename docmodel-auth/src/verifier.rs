//! Password verification.
//!
//! Uses Argon2id PHC strings (`$argon2id$v=19$...`) for stored hashes.

use crate::error::{AuthError, AuthResult};
use argon2::password_hash::{PasswordHash, PasswordHasher, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use rand::RngCore;
use tracing::warn;

/// Compares a raw password with a stored hash.
#[async_trait]
pub trait PasswordVerifier: Send + Sync {
    /// Returns true if `password` matches `hash`. A mismatch or an
    /// unreadable hash is `false`, never an error.
    async fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Argon2id verifier. Hashing runs on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Verifier;

#[async_trait]
impl PasswordVerifier for Argon2Verifier {
    async fn verify(&self, password: &str, hash: &str) -> bool {
        let password = password.to_owned();
        let hash = hash.to_owned();
        let outcome = tokio::task::spawn_blocking(move || {
            use argon2::password_hash::PasswordVerifier as _;

            let parsed = match PasswordHash::new(&hash) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("Stored password hash is unreadable: {}", e);
                    return false;
                }
            };
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .await;

        outcome.unwrap_or_else(|e| {
            warn!("Password verification task failed: {}", e);
            false
        })
    }
}

/// Hashes a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> AuthResult<String> {
    let mut salt_bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::Hashing(e.to_string()))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Hashing(e.to_string()))?;
    Ok(hash.to_string())
}
