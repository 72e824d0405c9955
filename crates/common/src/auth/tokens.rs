//! Opaque bearer tokens
//!
//! Clients hold the random token; the database holds its SHA-256 digest.

use sha2::{Digest, Sha256};

/// Prefix for session tokens
pub const SESSION_PREFIX: &str = "pvs_";

/// Prefix for password reset tokens
pub const RESET_PREFIX: &str = "pvr_";

/// Generate a new random token with the given prefix
pub fn generate_token(prefix: &str) -> String {
    let random_bytes: [u8; 32] = rand::random();
    format!("{}{}", prefix, hex::encode(random_bytes))
}

/// Hash a token for storage and lookup
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extract a token from an Authorization header value
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Find a cookie value in a Cookie header value
pub fn parse_cookie<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}
