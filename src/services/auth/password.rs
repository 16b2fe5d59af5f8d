//! Argon2id password hashing. Both operations run on the blocking pool.

use argon2::Argon2;
use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
};
use tokio::task::{JoinError, spawn_blocking};

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(argon2::password_hash::Error),
    #[error("password task did not complete")]
    Task(#[from] JoinError),
}

/// Hash a password with a fresh random salt into a PHC string.
pub async fn hash(password: &str) -> Result<String, PasswordError> {
    let password = password.to_owned();
    spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
    })
    .await?
    .map_err(PasswordError::Hash)
}

/// Check a password against its PHC string. Malformed hashes never match.
pub async fn verify(password: &str, phc: &str) -> Result<bool, PasswordError> {
    let password = password.to_owned();
    let phc = phc.to_owned();
    let matched = spawn_blocking(move || {
        PasswordHash::new(&phc).is_ok_and(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
    })
    .await?;
    Ok(matched)
}
