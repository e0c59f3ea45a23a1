// src/utils/hash.rs

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use crate::error::ServiceError;

/// Hashes a password into a salted argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ServiceError::Hashing(e.to_string()))?
        .to_string();

    Ok(password_hash)
}

/// A malformed stored hash is an error; a mismatching password is `Ok(false)`.
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, ServiceError> {
    let parsed_hash =
        PasswordHash::new(password_hash).map_err(|e| ServiceError::Hashing(e.to_string()))?;

    let result = Argon2::default().verify_password(password.as_bytes(), &parsed_hash);

    Ok(result.is_ok())
}
