//! `RocksDB` storage layer for tally.
//!
//! This crate provides persistent storage for the credit ledger, plan
//! profiles, top-up codes, and API keys, using `RocksDB` with column
//! families.
//!
//! # Architecture
//!
//! The ledger is the single source of truth: an append-only log of signed
//! credit deltas per user. All mutating compound operations (deduction,
//! redemption, plan upgrade) re-verify their precondition and commit in one
//! `WriteBatch` while holding a per-user (or per-code) mutex, so concurrent
//! requests can never overdraw a balance or double-consume a code.
//!
//! # Example
//!
//! ```no_run
//! use tally_store::{RocksStore, Store};
//! use tally_core::{LedgerEntry, UserId};
//!
//! let store = RocksStore::open("/tmp/tally-db").unwrap();
//!
//! let user_id = UserId::generate();
//! let entry = LedgerEntry::topup(user_id, 10, "WELCOME10", chrono::Utc::now());
//! store.append_entry(&entry).unwrap();
//!
//! let entries = store.list_entries(&user_id).unwrap();
//! assert_eq!(entries.len(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};

use tally_core::{
    ApiKeyId, ApiKeyRecord, CreditSource, EntryId, LedgerEntry, PlanTier, Profile, TopupCode,
    UserId,
};

/// Outcome of a guarded deduction.
///
/// Insufficiency is a normal outcome, not a fault; callers surface it to the
/// user and never retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeductOutcome {
    /// The charge committed and one negative ledger entry was appended.
    Charged {
        /// The appended entry.
        entry_id: EntryId,
        /// Which bucket paid: `plan` (quota) or `deduction` (extra credit).
        paid_from: CreditSource,
    },

    /// Neither bucket covered the amount; nothing was written.
    InsufficientFunds {
        /// Total available at the time of the check.
        available: i64,
    },
}

/// Outcome of a code redemption attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemOutcome {
    /// The code was consumed and the credit entry appended.
    Redeemed {
        /// Credits granted.
        credits: i64,
    },

    /// Unknown or already-consumed code. The two cases are deliberately
    /// indistinguishable so codes cannot be enumerated.
    Invalid,
}

/// Outcome of a plan upgrade attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// The tier changed and the audit entry was appended.
    Upgraded,

    /// The user already holds an active ultra plan; nothing was written.
    AlreadySubscribed,
}

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations (e.g. `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // Profile Operations
    // =========================================================================

    /// Insert or update a plan profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_profile(&self, profile: &Profile) -> Result<()>;

    /// Get a profile by user ID. A missing profile means the free tier.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>>;

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    /// Append a ledger entry. Entries are immutable once written.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn append_entry(&self, entry: &LedgerEntry) -> Result<()>;

    /// List all ledger entries for a user in chronological order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_entries(&self, user_id: &UserId) -> Result<Vec<LedgerEntry>>;

    /// List ledger entries for a user, newest first, with pagination.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_entries_page(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>>;

    // =========================================================================
    // Top-up Code Operations
    // =========================================================================

    /// Mint or overwrite a top-up code record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_code(&self, code: &TopupCode) -> Result<()>;

    /// Look up a code by its normalized string.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_code(&self, code: &str) -> Result<Option<TopupCode>>;

    // =========================================================================
    // API Key Operations
    // =========================================================================

    /// Insert an API key record and its hash-index entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_api_key(&self, record: &ApiKeyRecord) -> Result<()>;

    /// List a user's API keys, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_api_keys(&self, user_id: &UserId) -> Result<Vec<ApiKeyRecord>>;

    /// Delete a user's API key and its hash-index entry.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the key doesn't exist or belongs to
    /// another user.
    fn delete_api_key(&self, user_id: &UserId, key_id: &ApiKeyId) -> Result<()>;

    /// Resolve a presented key digest to its record, stamping `last_used_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn verify_api_key(&self, key_hash: &str, now: DateTime<Utc>) -> Result<Option<ApiKeyRecord>>;

    // =========================================================================
    // Compound Operations
    // =========================================================================

    /// Atomically charge a user for one completed billable unit of work.
    ///
    /// Re-verifies availability and appends the negative entry under the
    /// user's mutex: plan quota pays first (entry tagged `plan`), then extra
    /// credit (entry tagged `deduction`). A charge never splits across the
    /// two buckets. On insufficiency nothing is written.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidAmount` if `amount` is not positive.
    /// - `StoreError::Database`/`Serialization` on genuine faults.
    fn deduct(
        &self,
        user_id: &UserId,
        plan: PlanTier,
        amount: i64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<DeductOutcome>;

    /// Atomically redeem a top-up code for a user.
    ///
    /// Under the code's mutex: verify unused, mark redeemed, and append the
    /// credit entry in one `WriteBatch`. Concurrent attempts on the same code
    /// yield exactly one `Redeemed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn redeem_code(
        &self,
        user_id: &UserId,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<RedeemOutcome>;

    /// Atomically upgrade a user to the ultra tier.
    ///
    /// Under the user's mutex: re-check eligibility, set the tier, and append
    /// the audit entry in one `WriteBatch`. Duplicate submissions yield
    /// `AlreadySubscribed` without a second tier change or audit row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn upgrade_plan(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<UpgradeOutcome>;
}
