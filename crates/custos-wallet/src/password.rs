//! Password hashing behind a capability trait
//!
//! The custody flow stores only the resulting hash string; the hash is
//! opaque to everything else in this crate.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{CustodyError, Result};

/// One-way password hashing as seen by the custody engine
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, raw: &str) -> Result<String>;
    fn verify(&self, raw: &str, hash: &str) -> Result<bool>;
}

/// Argon2id implementation with library-default parameters
#[derive(Debug, Default, Clone, Copy)]
pub struct Argon2PasswordHasher;

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, raw: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(raw.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| CustodyError::PasswordHash(e.to_string()))
    }

    fn verify(&self, raw: &str, hash: &str) -> Result<bool> {
        let parsed =
            PasswordHash::new(hash).map_err(|e| CustodyError::PasswordHash(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(raw.as_bytes(), &parsed)
            .is_ok())
    }
}
