//! Credential hashing and session tokens
//!
//! # Architecture
//!
//! - Passwords are stored as SHA-256 over `salt || password`, with a random
//!   16-hex-char salt per user
//! - Session tokens are 256 random bits rendered as 64 hex chars; only the
//!   SHA-256 digest of a token is persisted
//! - Usernames are normalized to lowercase
//!
//! Pure functions only. Session storage lives in the server's database layer.

use rand::Rng;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Generate a random 16 hex character salt
pub fn generate_salt() -> String {
    let salt: u64 = rand::thread_rng().gen();
    format!("{:016x}", salt)
}

/// Salted SHA-256 of a password, as 64 hex characters
///
/// # Examples
///
/// ```
/// use votrack_common::auth::hash_password;
///
/// let hash = hash_password("00ff00ff00ff00ff", "secret-pass");
/// assert_eq!(hash.len(), 64);
/// assert_eq!(hash, hash_password("00ff00ff00ff00ff", "secret-pass"));
/// ```
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Check a password attempt against a stored salt/hash pair
pub fn verify_password(salt: &str, password: &str, expected_hash: &str) -> bool {
    let calculated = hash_password(salt, password);
    // Compare every byte so timing does not reveal the matching prefix
    calculated.len() == expected_hash.len()
        && calculated
            .bytes()
            .zip(expected_hash.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

/// Reject passwords shorter than [`MIN_PASSWORD_LEN`]
pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::InvalidInput(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Normalize and validate a username: 3-32 chars of `[a-z0-9._-]`
pub fn normalize_username(username: &str) -> Result<String> {
    let name = username.trim().to_lowercase();
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'));
    if !(3..=32).contains(&name.len()) || !valid_chars {
        return Err(Error::InvalidInput(format!(
            "invalid username '{}': use 3-32 characters a-z, 0-9, '.', '_' or '-'",
            username.trim()
        )));
    }
    Ok(name)
}

/// Generate a new opaque session token (64 hex chars)
pub fn generate_session_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Digest under which a session token is stored
pub fn token_digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Generate a random password for bootstrap accounts
pub fn generate_password() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnpqrstuvwxyz23456789";
    let mut rng = rand::thread_rng();
    (0..16)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}
