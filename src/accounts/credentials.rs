//! Argon2id password hashing.
//!
//! Hashing is CPU-bound, so the async wrappers move the work onto the
//! blocking pool.

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::CredentialError;

/// Hash a password into a PHC string.
pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| CredentialError::Hash(e.to_string()))
}

/// Check a password against a stored PHC string (constant-time).
pub fn verify_password(
    account_id: &str,
    password: &str,
    stored_hash: &str,
) -> Result<bool, CredentialError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|_| CredentialError::MalformedHash {
        account_id: account_id.to_string(),
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub async fn hash_password_async(password: String) -> Result<String, CredentialError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| CredentialError::Hash(format!("hashing task failed: {e}")))?
}

pub async fn verify_password_async(
    account_id: String,
    password: String,
    stored_hash: String,
) -> Result<bool, CredentialError> {
    tokio::task::spawn_blocking(move || verify_password(&account_id, &password, &stored_hash))
        .await
        .map_err(|e| CredentialError::Hash(format!("verification task failed: {e}")))?
}

/// Hash checked for logins naming no account, so they cost the same
/// argon2 work as a wrong password.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("no-such-account").ok());

/// Burn one verification for a login that matched no account. Always false.
pub async fn verify_unknown_account(password: String) -> Result<bool, CredentialError> {
    let Some(hash) = DUMMY_HASH.as_ref() else {
        return Ok(false);
    };
    verify_password_async(String::new(), password, hash.clone()).await?;
    Ok(false)
}
