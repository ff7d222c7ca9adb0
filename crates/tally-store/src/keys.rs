//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions for encoding keys used in column families
//! and the lock-registry namespace keys for per-entity serialization.

use tally_core::{ApiKeyId, EntryId, UserId};

/// Create a profile key from a user ID.
#[must_use]
pub fn profile_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a ledger entry key.
///
/// Format: `user_id (16 bytes) || entry_id (16 bytes)`
///
/// ULIDs are time-ordered, so a user's entries sort chronologically.
#[must_use]
pub fn ledger_key(user_id: &UserId, entry_id: &EntryId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&entry_id.to_bytes());
    key
}

/// Create a prefix for iterating all ledger entries for a user.
#[must_use]
pub fn ledger_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a top-up code key from a normalized code.
#[must_use]
pub fn code_key(code: &str) -> Vec<u8> {
    code.as_bytes().to_vec()
}

/// Create an API key record key.
///
/// Format: `user_id (16 bytes) || key_id (16 bytes)`
#[must_use]
pub fn api_key_key(user_id: &UserId, key_id: &ApiKeyId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(key_id.as_bytes());
    key
}

/// Create a prefix for iterating all API keys for a user.
#[must_use]
pub fn api_keys_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a hash-index key from a hex-encoded key digest.
#[must_use]
pub fn api_key_hash_key(key_hash: &str) -> Vec<u8> {
    key_hash.as_bytes().to_vec()
}

/// Lock-registry key serializing all mutations for one user.
#[must_use]
pub fn user_lock_key(user_id: &UserId) -> Vec<u8> {
    let mut key = Vec::with_capacity(21);
    key.extend_from_slice(b"user:");
    key.extend_from_slice(user_id.as_bytes());
    key
}

/// Lock-registry key serializing redemption attempts for one code.
#[must_use]
pub fn code_lock_key(code: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(5 + code.len());
    key.extend_from_slice(b"code:");
    key.extend_from_slice(code.as_bytes());
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_key_length() {
        let user_id = UserId::generate();
        assert_eq!(profile_key(&user_id).len(), 16);
    }

    #[test]
    fn ledger_key_format() {
        let user_id = UserId::generate();
        let entry_id = EntryId::generate();
        let key = ledger_key(&user_id, &entry_id);

        assert_eq!(key.len(), 32);
        assert_eq!(&key[..16], user_id.as_bytes());
        assert_eq!(&key[16..], entry_id.to_bytes());
    }

    #[test]
    fn ledger_keys_sort_chronologically() {
        let user_id = UserId::generate();
        let first = EntryId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = EntryId::generate();

        assert!(ledger_key(&user_id, &first) < ledger_key(&user_id, &second));
    }

    #[test]
    fn lock_namespaces_do_not_collide() {
        let user_id = UserId::generate();
        assert_ne!(user_lock_key(&user_id), code_lock_key("ABC"));
        assert!(user_lock_key(&user_id).starts_with(b"user:"));
        assert!(code_lock_key("ABC").starts_with(b"code:"));
    }
}
