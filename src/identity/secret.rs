//! Secret verification: Argon2id over PHC-format hashes. Stateless.

use anyhow::{Result, anyhow};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use once_cell::sync::Lazy;
use password_hash::{SaltString, PasswordHash};

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

// Fixed hash verified against when the principal does not exist, so the
// unknown-principal and bad-secret paths cost the same.
static DUMMY_PHC: Lazy<String> = Lazy::new(|| {
    hash_password("flowgate-dummy").unwrap_or_default()
});

/// Run a full verification against a throwaway hash and discard the result.
pub fn burn_verification(password: &str) {
    let _ = verify_password(&DUMMY_PHC, password);
}
