//! Ledger entry types.
//!
//! Every change to a user's credit position is an immutable, signed ledger
//! entry. Balances are never stored; they are folds over this log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EntryId, PlanTier, UserId};

/// The source whose entries are quota-accounting records.
///
/// Entries carrying this source log plan-quota consumption for the reset
/// windows and are excluded from the extra-credit sum.
pub const QUOTA_SOURCE: CreditSource = CreditSource::Plan;

/// Origin of a ledger entry.
///
/// The recognized sources form a closed set; anything else round-trips
/// through the `Other` fallback so old rows written with ad-hoc tags remain
/// readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CreditSource {
    /// Plan-quota consumption log (stats only, not purchased credit).
    Plan,

    /// Credit granted by redeeming a top-up code.
    TopupCode,

    /// Plan purchase audit marker.
    Purchase,

    /// Purchased/extra credit consumed by billable work.
    Deduction,

    /// Unrecognized tag, preserved verbatim.
    Other(String),
}

impl CreditSource {
    /// The wire name of this source.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Plan => "plan",
            Self::TopupCode => "topup_code",
            Self::Purchase => "purchase",
            Self::Deduction => "deduction",
            Self::Other(tag) => tag,
        }
    }

    /// Whether entries with this source count toward the extra-credit sum.
    #[must_use]
    pub fn counts_toward_extra(&self) -> bool {
        *self != QUOTA_SOURCE
    }
}

impl From<String> for CreditSource {
    fn from(value: String) -> Self {
        match value.as_str() {
            "plan" => Self::Plan,
            "topup_code" => Self::TopupCode,
            "purchase" => Self::Purchase,
            "deduction" => Self::Deduction,
            _ => Self::Other(value),
        }
    }
}

impl From<CreditSource> for String {
    fn from(source: CreditSource) -> Self {
        match source {
            CreditSource::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for CreditSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured tag describing a ledger entry's origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Which subsystem wrote the entry.
    pub source: CreditSource,

    /// Caller-supplied tag naming the billable operation (e.g. `scan_pipeline`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Free-form extra fields, preserved for the audit trail.
    #[serde(flatten, default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// An immutable signed credit transaction.
///
/// Entries are created by the deduction protocol, the redemption engine, or
/// the purchase engine, and are never updated or deleted. Together they form
/// the permanent audit trail and the sole input to balance computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry ID (ULID for time-ordering).
    pub id: EntryId,

    /// The user whose position changed.
    pub user_id: UserId,

    /// Credit units. Positive = credit added, negative = credit consumed.
    pub delta: i64,

    /// Origin tag.
    pub metadata: EntryMetadata,

    /// When the entry was written; drives daily/monthly windowing.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Record plan-quota consumption (stats-only; excluded from the
    /// extra-credit sum, counted by the reset windows).
    #[must_use]
    pub fn quota_usage(
        user_id: UserId,
        amount: i64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EntryId::generate(),
            user_id,
            delta: -amount.abs(),
            metadata: EntryMetadata {
                source: CreditSource::Plan,
                reason: Some(reason.to_string()),
                extra: serde_json::Map::new(),
            },
            created_at: now,
        }
    }

    /// Record a spend of purchased/extra credit.
    #[must_use]
    pub fn deduction(user_id: UserId, amount: i64, reason: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: EntryId::generate(),
            user_id,
            delta: -amount.abs(),
            metadata: EntryMetadata {
                source: CreditSource::Deduction,
                reason: Some(reason.to_string()),
                extra: serde_json::Map::new(),
            },
            created_at: now,
        }
    }

    /// Record credit granted by a redeemed top-up code.
    #[must_use]
    pub fn topup(user_id: UserId, credits: i64, code: &str, now: DateTime<Utc>) -> Self {
        let mut extra = serde_json::Map::new();
        extra.insert("code".to_string(), serde_json::Value::String(code.to_string()));

        Self {
            id: EntryId::generate(),
            user_id,
            delta: credits.abs(),
            metadata: EntryMetadata {
                source: CreditSource::TopupCode,
                reason: None,
                extra,
            },
            created_at: now,
        }
    }

    /// Record a plan purchase audit marker.
    ///
    /// The tier grants quota, not credit, so the delta is zero; the row
    /// exists to keep the transition in the audit trail.
    #[must_use]
    pub fn plan_purchase(user_id: UserId, plan: PlanTier, now: DateTime<Utc>) -> Self {
        let mut extra = serde_json::Map::new();
        extra.insert(
            "plan".to_string(),
            serde_json::Value::String(plan.as_str().to_string()),
        );

        Self {
            id: EntryId::generate(),
            user_id,
            delta: 0,
            metadata: EntryMetadata {
                source: CreditSource::Purchase,
                reason: None,
                extra,
            },
            created_at: now,
        }
    }

    /// Whether this entry adds credit.
    #[must_use]
    pub const fn is_credit(&self) -> bool {
        self.delta > 0
    }

    /// Whether this entry consumes credit.
    #[must_use]
    pub const fn is_debit(&self) -> bool {
        self.delta < 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_usage_is_negative_plan_tagged() {
        let entry = LedgerEntry::quota_usage(UserId::generate(), 3, "scan_pipeline", Utc::now());
        assert_eq!(entry.delta, -3);
        assert_eq!(entry.metadata.source, CreditSource::Plan);
        assert_eq!(entry.metadata.reason.as_deref(), Some("scan_pipeline"));
        assert!(entry.is_debit());
    }

    #[test]
    fn deduction_always_negative_even_for_negative_input() {
        let entry = LedgerEntry::deduction(UserId::generate(), -5, "scan", Utc::now());
        assert_eq!(entry.delta, -5);
        assert_eq!(entry.metadata.source, CreditSource::Deduction);
    }

    #[test]
    fn topup_records_the_code() {
        let entry = LedgerEntry::topup(UserId::generate(), 10, "WELCOME10", Utc::now());
        assert_eq!(entry.delta, 10);
        assert!(entry.is_credit());
        assert_eq!(
            entry.metadata.extra.get("code").and_then(|v| v.as_str()),
            Some("WELCOME10")
        );
    }

    #[test]
    fn purchase_marker_is_zero_delta() {
        let entry = LedgerEntry::plan_purchase(UserId::generate(), PlanTier::Ultra, Utc::now());
        assert_eq!(entry.delta, 0);
        assert_eq!(entry.metadata.source, CreditSource::Purchase);
        assert!(!entry.is_credit());
        assert!(!entry.is_debit());
    }

    #[test]
    fn only_plan_source_is_excluded_from_extra() {
        assert!(!CreditSource::Plan.counts_toward_extra());
        assert!(CreditSource::TopupCode.counts_toward_extra());
        assert!(CreditSource::Purchase.counts_toward_extra());
        assert!(CreditSource::Deduction.counts_toward_extra());
        assert!(CreditSource::Other("promo".into()).counts_toward_extra());
    }

    #[test]
    fn source_string_roundtrip_preserves_unknown_tags() {
        for raw in ["plan", "topup_code", "purchase", "deduction", "legacy_grant"] {
            let source = CreditSource::from(raw.to_string());
            assert_eq!(String::from(source.clone()), raw);
        }
        assert_eq!(
            CreditSource::from("legacy_grant".to_string()),
            CreditSource::Other("legacy_grant".into())
        );
    }

    #[test]
    fn entry_serde_json_shape_is_stable() {
        let entry = LedgerEntry::topup(UserId::generate(), 10, "WELCOME10", Utc::now());
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["metadata"]["source"], "topup_code");
        assert_eq!(value["metadata"]["code"], "WELCOME10");
        assert_eq!(value["delta"], 10);

        let back: LedgerEntry = serde_json::from_value(value).unwrap();
        assert_eq!(back.metadata.source, CreditSource::TopupCode);
        assert_eq!(back.delta, 10);
    }
}
