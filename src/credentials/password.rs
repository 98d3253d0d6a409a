use argon2::Argon2;
use rand::{rngs::OsRng, RngCore};
use tracing::error;

use crate::credentials::schema::{HASH_MIN_LENGTH, SALT_MIN_LENGTH};

pub fn generate_salt() -> Vec<u8> {
    let mut salt = vec![0u8; SALT_MIN_LENGTH];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derives the stored hash for `plain` with Argon2id.
pub fn derive_hash(plain: &str, salt: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut hash = vec![0u8; HASH_MIN_LENGTH];
    Argon2::default()
        .hash_password_into(plain.as_bytes(), salt, &mut hash)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password_into error");
            anyhow::anyhow!(e.to_string())
        })?;
    Ok(hash)
}

/// Fresh salt plus the hash derived with it, as `(hash, salt)`.
pub fn new_secret(plain: &str) -> anyhow::Result<(Vec<u8>, Vec<u8>)> {
    let salt = generate_salt();
    let hash = derive_hash(plain, &salt)?;
    Ok((hash, salt))
}
