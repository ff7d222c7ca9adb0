//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Plan profiles, keyed by `user_id`.
    pub const PROFILES: &str = "profiles";

    /// Ledger entries, keyed by `user_id || entry_id` (ULID). Since ULIDs
    /// are time-ordered, a prefix scan yields a user's audit trail in
    /// chronological order.
    pub const LEDGER: &str = "ledger";

    /// Top-up codes, keyed by the normalized code string.
    pub const TOPUP_CODES: &str = "topup_codes";

    /// API key records, keyed by `user_id || key_id`.
    pub const API_KEYS: &str = "api_keys";

    /// Lookup index: SHA-256 key digest -> `user_id || key_id`.
    pub const API_KEYS_BY_HASH: &str = "api_keys_by_hash";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::PROFILES,
        cf::LEDGER,
        cf::TOPUP_CODES,
        cf::API_KEYS,
        cf::API_KEYS_BY_HASH,
    ]
}
