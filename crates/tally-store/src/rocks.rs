//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait,
//! including the guarded compound operations (deduct, redeem, upgrade) that
//! serialize per entity.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode, Options,
    WriteBatch,
};
use serde::{Deserialize, Serialize};

use tally_core::{
    compute_status, ApiKeyId, ApiKeyRecord, LedgerEntry, PlanTier, Profile, TopupCode, UserId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{DeductOutcome, RedeemOutcome, Store, UpgradeOutcome};

/// Per-entity mutex table.
///
/// Compound operations hold the entity's lock across their whole
/// read-check-write sequence, which is what makes the re-verification inside
/// them authoritative. Entries are a few bytes each and are never evicted.
struct LockRegistry {
    inner: Mutex<HashMap<Vec<u8>, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Get (or create) the lock for an entity key.
    fn entity_lock(&self, key: &[u8]) -> Arc<Mutex<()>> {
        let mut map = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        map.entry(key.to_vec()).or_default().clone()
    }
}

/// Value stored in the API key hash index.
#[derive(Serialize, Deserialize)]
struct HashIndexEntry {
    user_id: UserId,
    key_id: ApiKeyId,
}

/// `RocksDB`-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<rocksdb::MultiThreaded>>,
    locks: LockRegistry,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            locks: LockRegistry::new(),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Collect all values under a 16-byte prefix in a column family.
    fn scan_prefix<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        prefix: &[u8],
    ) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));

        let mut values = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(prefix) {
                break;
            }

            values.push(Self::deserialize(&value)?);
        }

        Ok(values)
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Profile Operations
    // =========================================================================

    fn put_profile(&self, profile: &Profile) -> Result<()> {
        let cf = self.cf(cf::PROFILES)?;
        let key = keys::profile_key(&profile.user_id);
        let value = Self::serialize(profile)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>> {
        let cf = self.cf(cf::PROFILES)?;
        let key = keys::profile_key(user_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    fn append_entry(&self, entry: &LedgerEntry) -> Result<()> {
        let cf = self.cf(cf::LEDGER)?;
        let key = keys::ledger_key(&entry.user_id, &entry.id);
        let value = Self::serialize(entry)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn list_entries(&self, user_id: &UserId) -> Result<Vec<LedgerEntry>> {
        self.scan_prefix(cf::LEDGER, &keys::ledger_prefix(user_id))
    }

    fn list_entries_page(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<LedgerEntry>> {
        let mut entries = self.list_entries(user_id)?;
        entries.reverse(); // newest first

        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }

    // =========================================================================
    // Top-up Code Operations
    // =========================================================================

    fn put_code(&self, code: &TopupCode) -> Result<()> {
        let cf = self.cf(cf::TOPUP_CODES)?;
        let key = keys::code_key(&code.code);
        let value = Self::serialize(code)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_code(&self, code: &str) -> Result<Option<TopupCode>> {
        let cf = self.cf(cf::TOPUP_CODES)?;
        let key = keys::code_key(code);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    // =========================================================================
    // API Key Operations
    // =========================================================================

    fn put_api_key(&self, record: &ApiKeyRecord) -> Result<()> {
        let cf_keys = self.cf(cf::API_KEYS)?;
        let cf_by_hash = self.cf(cf::API_KEYS_BY_HASH)?;

        let record_key = keys::api_key_key(&record.user_id, &record.id);
        let hash_key = keys::api_key_hash_key(&record.key_hash);
        let record_value = Self::serialize(record)?;
        let index_value = Self::serialize(&HashIndexEntry {
            user_id: record.user_id,
            key_id: record.id,
        })?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_keys, &record_key, &record_value);
        batch.put_cf(&cf_by_hash, &hash_key, &index_value);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn list_api_keys(&self, user_id: &UserId) -> Result<Vec<ApiKeyRecord>> {
        let mut records: Vec<ApiKeyRecord> =
            self.scan_prefix(cf::API_KEYS, &keys::api_keys_prefix(user_id))?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    fn delete_api_key(&self, user_id: &UserId, key_id: &ApiKeyId) -> Result<()> {
        let cf_keys = self.cf(cf::API_KEYS)?;
        let cf_by_hash = self.cf(cf::API_KEYS_BY_HASH)?;
        let record_key = keys::api_key_key(user_id, key_id);

        let record: ApiKeyRecord = self
            .db
            .get_cf(&cf_keys, &record_key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()?
            .ok_or(StoreError::NotFound)?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf_keys, &record_key);
        batch.delete_cf(&cf_by_hash, keys::api_key_hash_key(&record.key_hash));

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn verify_api_key(&self, key_hash: &str, now: DateTime<Utc>) -> Result<Option<ApiKeyRecord>> {
        let cf_by_hash = self.cf(cf::API_KEYS_BY_HASH)?;

        let Some(index_data) = self
            .db
            .get_cf(&cf_by_hash, keys::api_key_hash_key(key_hash))
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let index: HashIndexEntry = Self::deserialize(&index_data)?;

        let cf_keys = self.cf(cf::API_KEYS)?;
        let record_key = keys::api_key_key(&index.user_id, &index.key_id);
        let Some(record_data) = self
            .db
            .get_cf(&cf_keys, &record_key)
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            // Dangling index entry from an interrupted delete; treat as unknown.
            return Ok(None);
        };

        let mut record: ApiKeyRecord = Self::deserialize(&record_data)?;
        record.last_used_at = Some(now);

        let value = Self::serialize(&record)?;
        self.db
            .put_cf(&cf_keys, &record_key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Some(record))
    }

    // =========================================================================
    // Compound Operations
    // =========================================================================

    fn deduct(
        &self,
        user_id: &UserId,
        plan: PlanTier,
        amount: i64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<DeductOutcome> {
        if amount <= 0 {
            return Err(StoreError::InvalidAmount(amount));
        }

        let lock = self.locks.entity_lock(&keys::user_lock_key(user_id));
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Authoritative re-check: any pre-check the caller did may be stale
        // by now; this one runs under the user's mutex.
        let entries = self.list_entries(user_id)?;
        let status = compute_status(plan, &entries, now);

        // Plan quota pays first, then extra credit. A charge never splits
        // across the two buckets.
        let entry = if status.plan_remaining >= amount {
            LedgerEntry::quota_usage(*user_id, amount, reason, now)
        } else if status.extra_credits.max(0) >= amount {
            LedgerEntry::deduction(*user_id, amount, reason, now)
        } else {
            tracing::debug!(
                user_id = %user_id,
                amount = %amount,
                available = %status.total_available,
                "Deduction declined: insufficient funds"
            );
            return Ok(DeductOutcome::InsufficientFunds {
                available: status.total_available,
            });
        };

        let paid_from = entry.metadata.source.clone();
        self.append_entry(&entry)?;

        tracing::debug!(
            user_id = %user_id,
            amount = %amount,
            paid_from = %paid_from,
            entry_id = %entry.id,
            "Deduction committed"
        );

        Ok(DeductOutcome::Charged {
            entry_id: entry.id,
            paid_from,
        })
    }

    fn redeem_code(
        &self,
        user_id: &UserId,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<RedeemOutcome> {
        let lock = self.locks.entity_lock(&keys::code_lock_key(code));
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(mut record) = self.get_code(code)? else {
            return Ok(RedeemOutcome::Invalid);
        };

        if record.is_redeemed() {
            return Ok(RedeemOutcome::Invalid);
        }

        record.redeemed_by = Some(*user_id);
        record.redeemed_at = Some(now);

        let entry = LedgerEntry::topup(*user_id, record.credits, &record.code, now);

        let cf_codes = self.cf(cf::TOPUP_CODES)?;
        let cf_ledger = self.cf(cf::LEDGER)?;

        let code_value = Self::serialize(&record)?;
        let entry_value = Self::serialize(&entry)?;

        // The code state flip and the credit entry commit together or not at
        // all.
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_codes, keys::code_key(&record.code), &code_value);
        batch.put_cf(
            &cf_ledger,
            keys::ledger_key(user_id, &entry.id),
            &entry_value,
        );

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(
            user_id = %user_id,
            credits = %record.credits,
            "Top-up code redeemed"
        );

        Ok(RedeemOutcome::Redeemed {
            credits: record.credits,
        })
    }

    fn upgrade_plan(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<UpgradeOutcome> {
        let lock = self.locks.entity_lock(&keys::user_lock_key(user_id));
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut profile = self
            .get_profile(user_id)?
            .unwrap_or_else(|| Profile::new(*user_id, now));

        if profile.is_ultra(now) {
            return Ok(UpgradeOutcome::AlreadySubscribed);
        }

        profile.plan = PlanTier::Ultra;
        profile.plan_expires_at = None;
        profile.updated_at = now;

        let entry = LedgerEntry::plan_purchase(*user_id, PlanTier::Ultra, now);

        let cf_profiles = self.cf(cf::PROFILES)?;
        let cf_ledger = self.cf(cf::LEDGER)?;

        let profile_value = Self::serialize(&profile)?;
        let entry_value = Self::serialize(&entry)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_profiles, keys::profile_key(user_id), &profile_value);
        batch.put_cf(
            &cf_ledger,
            keys::ledger_key(user_id, &entry.id),
            &entry_value,
        );

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(user_id = %user_id, "Plan upgraded to ultra");

        Ok(UpgradeOutcome::Upgraded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn profile_roundtrip() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        assert!(store.get_profile(&user_id).unwrap().is_none());

        let profile = Profile::new(user_id, Utc::now());
        store.put_profile(&profile).unwrap();

        let retrieved = store.get_profile(&user_id).unwrap().unwrap();
        assert_eq!(retrieved.plan, PlanTier::Free);
        assert_eq!(retrieved.user_id, user_id);
    }

    #[test]
    fn ledger_appends_in_chronological_order() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let first = LedgerEntry::topup(user_id, 10, "FIRST", Utc::now());
        store.append_entry(&first).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(2)); // distinct ULID timestamps

        let second = LedgerEntry::deduction(user_id, 1, "scan", Utc::now());
        store.append_entry(&second).unwrap();

        let entries = store.list_entries(&user_id).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, first.id);
        assert_eq!(entries[1].id, second.id);

        // Pagination is newest first.
        let page1 = store.list_entries_page(&user_id, 1, 0).unwrap();
        let page2 = store.list_entries_page(&user_id, 1, 1).unwrap();
        assert_eq!(page1[0].id, second.id);
        assert_eq!(page2[0].id, first.id);
    }

    #[test]
    fn ledger_is_isolated_per_user() {
        let (store, _dir) = create_test_store();
        let alice = UserId::generate();
        let bob = UserId::generate();

        store
            .append_entry(&LedgerEntry::topup(alice, 10, "CODE", Utc::now()))
            .unwrap();

        assert_eq!(store.list_entries(&alice).unwrap().len(), 1);
        assert!(store.list_entries(&bob).unwrap().is_empty());
    }

    #[test]
    fn deduct_prefers_plan_quota() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();
        let now = Utc::now();

        store
            .append_entry(&LedgerEntry::topup(user_id, 10, "CODE", now))
            .unwrap();

        let outcome = store
            .deduct(&user_id, PlanTier::Free, 1, "scan_pipeline", now)
            .unwrap();

        match outcome {
            DeductOutcome::Charged { paid_from, .. } => {
                assert_eq!(paid_from, tally_core::CreditSource::Plan);
            }
            DeductOutcome::InsufficientFunds { .. } => panic!("deduction should succeed"),
        }

        let entries = store.list_entries(&user_id).unwrap();
        let status = compute_status(PlanTier::Free, &entries, now);
        assert_eq!(status.daily_used, 1);
        assert_eq!(status.extra_credits, 10); // untouched
    }

    #[test]
    fn deduct_falls_back_to_extra_credits() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();
        let now = Utc::now();

        // Exhaust today's plan quota, then add purchased credit.
        store
            .append_entry(&LedgerEntry::quota_usage(user_id, 50, "scan", now))
            .unwrap();
        store
            .append_entry(&LedgerEntry::topup(user_id, 5, "CODE", now))
            .unwrap();

        let outcome = store
            .deduct(&user_id, PlanTier::Free, 1, "scan_pipeline", now)
            .unwrap();

        match outcome {
            DeductOutcome::Charged { paid_from, .. } => {
                assert_eq!(paid_from, tally_core::CreditSource::Deduction);
            }
            DeductOutcome::InsufficientFunds { .. } => panic!("deduction should succeed"),
        }

        let entries = store.list_entries(&user_id).unwrap();
        let status = compute_status(PlanTier::Free, &entries, now);
        assert_eq!(status.extra_credits, 4);
        assert_eq!(status.daily_used, 50); // plan usage unchanged
    }

    #[test]
    fn deduct_on_empty_balance_writes_nothing() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();
        let now = Utc::now();

        // Exhaust the plan quota with no extra credit.
        store
            .append_entry(&LedgerEntry::quota_usage(user_id, 50, "scan", now))
            .unwrap();

        let before = store.list_entries(&user_id).unwrap().len();
        let outcome = store
            .deduct(&user_id, PlanTier::Free, 1, "scan_pipeline", now)
            .unwrap();
        let after = store.list_entries(&user_id).unwrap().len();

        assert_eq!(outcome, DeductOutcome::InsufficientFunds { available: 0 });
        assert_eq!(before, after);
    }

    #[test]
    fn deduct_never_splits_across_buckets() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();
        let now = Utc::now();

        // 2 left on plan, 2 extra: a charge of 3 fits neither bucket alone.
        store
            .append_entry(&LedgerEntry::quota_usage(user_id, 48, "scan", now))
            .unwrap();
        store
            .append_entry(&LedgerEntry::topup(user_id, 2, "CODE", now))
            .unwrap();

        let outcome = store
            .deduct(&user_id, PlanTier::Free, 3, "scan_pipeline", now)
            .unwrap();
        assert_eq!(outcome, DeductOutcome::InsufficientFunds { available: 4 });
    }

    #[test]
    fn deduct_rejects_non_positive_amounts() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let result = store.deduct(&user_id, PlanTier::Free, 0, "scan", Utc::now());
        assert!(matches!(result, Err(StoreError::InvalidAmount(0))));

        let result = store.deduct(&user_id, PlanTier::Free, -3, "scan", Utc::now());
        assert!(matches!(result, Err(StoreError::InvalidAmount(-3))));
    }

    #[test]
    fn concurrent_deductions_never_overdraw() {
        let (store, _dir) = create_test_store();
        let store = Arc::new(store);
        let user_id = UserId::generate();
        let now = Utc::now();

        // No plan quota left; exactly 5 extra credits.
        store
            .append_entry(&LedgerEntry::quota_usage(user_id, 50, "scan", now))
            .unwrap();
        store
            .append_entry(&LedgerEntry::topup(user_id, 5, "CODE", now))
            .unwrap();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .deduct(&user_id, PlanTier::Free, 1, "scan_pipeline", now)
                        .unwrap()
                })
            })
            .collect();

        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let charged = outcomes
            .iter()
            .filter(|o| matches!(o, DeductOutcome::Charged { .. }))
            .count();

        assert_eq!(charged, 5);

        let entries = store.list_entries(&user_id).unwrap();
        let status = compute_status(PlanTier::Free, &entries, now);
        assert_eq!(status.extra_credits, 0);
        assert_eq!(status.total_available, 0);
        // quota log + topup + exactly 5 deduction rows
        assert_eq!(entries.len(), 7);
    }

    #[test]
    fn redeem_consumes_code_exactly_once() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();
        let now = Utc::now();

        store
            .put_code(&TopupCode::new("WELCOME10".into(), 10, now))
            .unwrap();

        let outcome = store.redeem_code(&user_id, "WELCOME10", now).unwrap();
        assert_eq!(outcome, RedeemOutcome::Redeemed { credits: 10 });

        let record = store.get_code("WELCOME10").unwrap().unwrap();
        assert_eq!(record.redeemed_by, Some(user_id));
        assert!(record.redeemed_at.is_some());

        let entries = store.list_entries(&user_id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].delta, 10);

        // Second attempt, by anyone, is a normal invalid outcome.
        let outcome = store
            .redeem_code(&UserId::generate(), "WELCOME10", now)
            .unwrap();
        assert_eq!(outcome, RedeemOutcome::Invalid);
    }

    #[test]
    fn redeem_unknown_code_is_invalid() {
        let (store, _dir) = create_test_store();
        let outcome = store
            .redeem_code(&UserId::generate(), "NOSUCH", Utc::now())
            .unwrap();
        assert_eq!(outcome, RedeemOutcome::Invalid);
    }

    #[test]
    fn concurrent_redemptions_yield_one_success() {
        let (store, _dir) = create_test_store();
        let store = Arc::new(store);
        let now = Utc::now();

        store
            .put_code(&TopupCode::new("RACE10".into(), 10, now))
            .unwrap();

        let users: Vec<UserId> = (0..8).map(|_| UserId::generate()).collect();
        let handles: Vec<_> = users
            .iter()
            .map(|user| {
                let store = Arc::clone(&store);
                let user = *user;
                std::thread::spawn(move || store.redeem_code(&user, "RACE10", Utc::now()).unwrap())
            })
            .collect();

        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let redeemed = outcomes
            .iter()
            .filter(|o| matches!(o, RedeemOutcome::Redeemed { .. }))
            .count();
        assert_eq!(redeemed, 1);

        // Exactly one +10 entry exists across all participants.
        let total_rows: usize = users
            .iter()
            .map(|u| store.list_entries(u).unwrap().len())
            .sum();
        assert_eq!(total_rows, 1);
    }

    #[test]
    fn upgrade_is_idempotent() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();
        let now = Utc::now();

        let outcome = store.upgrade_plan(&user_id, now).unwrap();
        assert_eq!(outcome, UpgradeOutcome::Upgraded);

        let profile = store.get_profile(&user_id).unwrap().unwrap();
        assert_eq!(profile.plan, PlanTier::Ultra);

        let outcome = store.upgrade_plan(&user_id, now).unwrap();
        assert_eq!(outcome, UpgradeOutcome::AlreadySubscribed);

        // Exactly one audit row.
        let entries = store.list_entries(&user_id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].delta, 0);
        assert_eq!(entries[0].metadata.source, tally_core::CreditSource::Purchase);
    }

    #[test]
    fn upgrade_after_expiry_reactivates() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();
        let purchase_time = at(2025, 1, 10, 12, 0, 0);

        store.upgrade_plan(&user_id, purchase_time).unwrap();

        // Simulate the billing collaborator setting an expiry that lapsed.
        let mut profile = store.get_profile(&user_id).unwrap().unwrap();
        profile.plan_expires_at = Some(at(2025, 2, 10, 12, 0, 0));
        store.put_profile(&profile).unwrap();

        let later = at(2025, 3, 1, 0, 0, 0);
        let outcome = store.upgrade_plan(&user_id, later).unwrap();
        assert_eq!(outcome, UpgradeOutcome::Upgraded);

        let profile = store.get_profile(&user_id).unwrap().unwrap();
        assert_eq!(profile.effective_plan(later), PlanTier::Ultra);
        assert!(profile.plan_expires_at.is_none());
    }

    #[test]
    fn api_key_lifecycle() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();
        let now = Utc::now();

        let record = ApiKeyRecord {
            id: ApiKeyId::generate(),
            user_id,
            label: "ci".into(),
            key_hash: "aa".repeat(32),
            display_hint: "tl_sk_…beef".into(),
            created_at: now,
            last_used_at: None,
        };
        store.put_api_key(&record).unwrap();

        let listed = store.list_api_keys(&user_id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].label, "ci");

        // Verification resolves by hash and stamps last_used_at.
        let verified = store
            .verify_api_key(&record.key_hash, now)
            .unwrap()
            .unwrap();
        assert_eq!(verified.user_id, user_id);
        assert_eq!(verified.last_used_at, Some(now));

        assert!(store.verify_api_key("unknown-hash", now).unwrap().is_none());

        // Deletion removes both the record and the hash index.
        store.delete_api_key(&user_id, &record.id).unwrap();
        assert!(store.list_api_keys(&user_id).unwrap().is_empty());
        assert!(store
            .verify_api_key(&record.key_hash, now)
            .unwrap()
            .is_none());

        let result = store.delete_api_key(&user_id, &record.id);
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[test]
    fn delete_api_key_is_scoped_to_owner() {
        let (store, _dir) = create_test_store();
        let owner = UserId::generate();
        let intruder = UserId::generate();

        let record = ApiKeyRecord {
            id: ApiKeyId::generate(),
            user_id: owner,
            label: "prod".into(),
            key_hash: "bb".repeat(32),
            display_hint: "tl_sk_…cafe".into(),
            created_at: Utc::now(),
            last_used_at: None,
        };
        store.put_api_key(&record).unwrap();

        let result = store.delete_api_key(&intruder, &record.id);
        assert!(matches!(result, Err(StoreError::NotFound)));
        assert_eq!(store.list_api_keys(&owner).unwrap().len(), 1);
    }
}
