//! Cryptographic utilities for API key handling.
//!
//! API key secrets are never persisted; only their SHA-256 digest is stored,
//! and lookups go through the digest index.

use sha2::{Digest, Sha256};

/// Prefix carried by every tally API key.
pub const API_KEY_PREFIX: &str = "tl_sk_";

/// Compute SHA-256 and return the hex-encoded result (64 characters).
#[must_use]
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a fresh API key secret.
///
/// Returns `(plaintext, digest, display_hint)`. The plaintext is shown to
/// the user exactly once; only the digest and the hint are stored.
#[must_use]
pub fn generate_api_key() -> (String, String, String) {
    let plaintext = format!("{API_KEY_PREFIX}{}", uuid::Uuid::new_v4().simple());
    let digest = sha256_hex(&plaintext);
    let tail = &plaintext[plaintext.len() - 4..];
    let display_hint = format!("{API_KEY_PREFIX}\u{2026}{tail}");
    (plaintext, digest, display_hint)
}

/// Constant-time string comparison to prevent timing attacks.
///
/// Used when comparing presented service/admin keys against configured
/// values.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
