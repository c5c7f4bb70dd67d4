use std::sync::OnceLock;

use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand_core::OsRng;

use crate::error::AppError;

pub fn hash_password(plaintext: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Error while hashing password: {}", e)))
}

/// False for a wrong password and for a hash that cannot be parsed.
pub fn verify_password(plaintext: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed_hash) => Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok(),
        Err(_) => false,
    }
}

/// Hashing is deliberately slow, so async callers go through the blocking pool.
pub async fn hash_password_blocking(plaintext: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&plaintext)).await?
}

pub async fn verify_password_blocking(plaintext: String, hash: String) -> Result<bool, AppError> {
    Ok(tokio::task::spawn_blocking(move || verify_password(&plaintext, &hash)).await?)
}

/// Hash that stands in when there is no stored one, so a lookup miss costs
/// as much as a real verification.
fn dummy_hash() -> &'static str {
    static DUMMY_HASH: OnceLock<String> = OnceLock::new();
    DUMMY_HASH.get_or_init(|| hash_password("unused dummy password").unwrap_or_default())
}

/// Runs one verification against [`dummy_hash`] and discards the outcome.
pub async fn verify_dummy_blocking(plaintext: String) -> Result<(), AppError> {
    tokio::task::spawn_blocking(move || {
        verify_password(&plaintext, dummy_hash());
    })
    .await?;
    Ok(())
}
