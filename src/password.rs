//! Password and PIN hashing utilities

use argon2::Argon2;
use argon2::password_hash::PasswordHash;
use argon2::password_hash::PasswordHasher;
use argon2::password_hash::PasswordVerifier;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;

use crate::error::Error;
use crate::error::Result;

/// Generate a new random secret
pub fn generate() -> String {
    SaltString::generate(&mut OsRng).to_string()
}

/// Hash a given secret with a fresh salt, in PHC string format
pub fn hash(secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = Argon2::default();

    let hashed = argon2
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|err| Error::Storage(format!("Could not hash secret: {err}")))?;

    Ok(hashed.to_string())
}

/// Is this string a PHC hash produced by [`hash`]?
pub fn is_hash(value: &str) -> bool {
    PasswordHash::new(value).is_ok()
}

/// Verify a given secret against a given hash
///
/// An unparsable hash never verifies
pub fn verify(hashed: &str, secret: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hashed) else {
        return false;
    };

    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed_hash)
        .is_ok()
}
