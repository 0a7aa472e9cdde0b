use crate::error::{AppError, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use base64::Engine;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

pub const MAX_USERNAME_BYTES: usize = 254;
pub const MAX_PASSWORD_BYTES: usize = 1024;

#[derive(Debug)]
pub struct Password;

impl Password {
    /// Derives a salted Argon2id PHC string.
    ///
    /// # Errors
    /// Returns `AppError::Internal` if hashing fails.
    #[tracing::instrument(skip(password), level = "debug")]
    pub fn hash(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash = argon2.hash_password(password.as_bytes(), &salt).map_err(|_| AppError::Internal)?.to_string();
        Ok(password_hash)
    }

    /// # Errors
    /// Returns `AppError::Internal` if the stored hash is not a valid PHC string.
    pub fn verify(password: &str, hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(hash).map_err(|_| AppError::Internal)?;
        Ok(Argon2::default().verify_password(password.as_bytes(), &parsed_hash).is_ok())
    }

    /// Burns one verification against a throwaway hash so that a missing user
    /// costs as much as a wrong password.
    pub fn verify_dummy(password: &str) {
        static DUMMY: OnceLock<Option<String>> = OnceLock::new();
        if let Some(hash) = DUMMY.get_or_init(|| Self::hash("latchkey-dummy-password").ok()) {
            let _ = Self::verify(password, hash);
        }
    }

    /// # Errors
    /// Returns `AppError::BadRequest` if the password is empty or too long.
    pub fn validate(password: &str) -> Result<()> {
        if password.is_empty() {
            return Err(AppError::BadRequest("Password must not be empty".to_string()));
        }
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(AppError::BadRequest(format!("Password must be at most {MAX_PASSWORD_BYTES} bytes")));
        }
        Ok(())
    }
}

/// # Errors
/// Returns `AppError::BadRequest` if the username is blank, too long, or contains whitespace.
pub fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() {
        return Err(AppError::BadRequest("Username must not be empty".to_string()));
    }
    if username.len() > MAX_USERNAME_BYTES {
        return Err(AppError::BadRequest(format!("Username must be at most {MAX_USERNAME_BYTES} bytes")));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(AppError::BadRequest("Username must not contain whitespace".to_string()));
    }
    Ok(())
}

#[derive(Debug)]
pub struct OpaqueToken;

impl OpaqueToken {
    /// Generates a cryptographically secure random string (32 bytes -> Base64).
    #[must_use]
    pub fn generate() -> String {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Hashes a token using SHA-256 for secure storage.
    #[must_use]
    pub fn hash(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }
}
