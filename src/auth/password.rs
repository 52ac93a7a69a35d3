//! Password hashing
//!
//! Salted HMAC-SHA256 digests stored as `base64(salt)$base64(tag)`.
//! Verification recomputes the tag and compares in constant time.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

const SALT_BYTES: usize = 16;

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let mut salt = [0u8; SALT_BYTES];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut mac = HmacSha256::new_from_slice(&salt)
        .map_err(|e| AppError::Encryption(e.to_string()))?;
    mac.update(password.as_bytes());
    let tag = mac.finalize().into_bytes();

    Ok(format!(
        "{}${}",
        URL_SAFE_NO_PAD.encode(salt),
        URL_SAFE_NO_PAD.encode(tag)
    ))
}

/// Verify a password against a stored hash
///
/// Returns false for malformed stored values instead of erroring, so a
/// corrupt row behaves like a wrong password.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_b64, tag_b64)) = stored.split_once('$') else {
        return false;
    };

    let Ok(salt) = URL_SAFE_NO_PAD.decode(salt_b64) else {
        return false;
    };
    let Ok(tag) = URL_SAFE_NO_PAD.decode(tag_b64) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(&salt) else {
        return false;
    };
    mac.update(password.as_bytes());

    mac.verify_slice(&tag).is_ok()
}
