//! Plan tiers, quota limits, and reset windows.
//!
//! The entitlement policy is a pure mapping from a plan tier to its daily and
//! monthly allowances, plus the UTC window boundaries used to slice the
//! ledger for usage counts.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Daily quota for the free tier.
pub const FREE_DAILY_LIMIT: i64 = 50;
/// Monthly quota for the free tier.
pub const FREE_MONTHLY_LIMIT: i64 = 50;
/// Daily quota for the ultra tier.
pub const ULTRA_DAILY_LIMIT: i64 = 50;
/// Monthly quota for the ultra tier.
pub const ULTRA_MONTHLY_LIMIT: i64 = 1500;

/// Available plan tiers.
///
/// Deserialization is lenient: plan values come back out of stored profiles
/// and external checkout callbacks, and an unrecognized tier degrades to
/// `Free` instead of failing the whole record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlanTier {
    /// Free tier: the monthly cap equals the daily cap, so quota is
    /// effectively a small trial allowance.
    Free,

    /// Ultra tier: same daily pacing cap, materially higher monthly cap.
    Ultra,
}

/// Quota limits for a plan tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanLimits {
    /// Maximum quota units per UTC day.
    pub daily_limit: i64,
    /// Maximum quota units per UTC month.
    pub monthly_limit: i64,
}

impl PlanTier {
    /// Get the quota limits for this tier.
    #[must_use]
    pub const fn limits(&self) -> PlanLimits {
        match self {
            Self::Free => PlanLimits {
                daily_limit: FREE_DAILY_LIMIT,
                monthly_limit: FREE_MONTHLY_LIMIT,
            },
            Self::Ultra => PlanLimits {
                daily_limit: ULTRA_DAILY_LIMIT,
                monthly_limit: ULTRA_MONTHLY_LIMIT,
            },
        }
    }

    /// Parse a tier name leniently: trimmed, case-folded, and anything
    /// unrecognized treated as `Free` (the most restrictive tier).
    #[must_use]
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "ultra" => Self::Ultra,
            _ => Self::Free,
        }
    }

    /// The wire name of this tier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Ultra => "ultra",
        }
    }
}

impl From<String> for PlanTier {
    fn from(value: String) -> Self {
        Self::parse_lenient(&value)
    }
}

impl From<PlanTier> for String {
    fn from(tier: PlanTier) -> Self {
        tier.as_str().to_string()
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Start of the UTC day containing `now`.
#[must_use]
pub fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(now.date_naive().and_time(NaiveTime::MIN), Utc)
}

/// Start of the UTC month containing `now`.
#[must_use]
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    // Day 1 of an existing year/month is always a valid date.
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .unwrap_or_else(|| now.date_naive());
    DateTime::from_naive_utc_and_offset(first.and_time(NaiveTime::MIN), Utc)
}

/// A user's plan profile.
///
/// This is the only mutable per-user record; everything else about a user's
/// balance is derived from the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// The user this profile belongs to.
    pub user_id: UserId,

    /// The subscribed plan tier.
    pub plan: PlanTier,

    /// When the plan lapses back to free, if bounded.
    pub plan_expires_at: Option<DateTime<Utc>>,

    /// When the profile was created.
    pub created_at: DateTime<Utc>,

    /// When the profile was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Create a fresh free-tier profile.
    #[must_use]
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            plan: PlanTier::Free,
            plan_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The plan tier in effect at `now`.
    ///
    /// An ultra plan past its expiry behaves as free; an unset expiry never
    /// lapses. Free plans ignore the expiry field entirely.
    #[must_use]
    pub fn effective_plan(&self, now: DateTime<Utc>) -> PlanTier {
        match (self.plan, self.plan_expires_at) {
            (PlanTier::Ultra, Some(expiry)) if expiry <= now => PlanTier::Free,
            (plan, _) => plan,
        }
    }

    /// Whether the profile currently grants the ultra tier.
    #[must_use]
    pub fn is_ultra(&self, now: DateTime<Utc>) -> bool {
        self.effective_plan(now) == PlanTier::Ultra
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn tier_limits() {
        assert_eq!(PlanTier::Free.limits().daily_limit, 50);
        assert_eq!(PlanTier::Free.limits().monthly_limit, 50);
        assert_eq!(PlanTier::Ultra.limits().daily_limit, 50);
        assert_eq!(PlanTier::Ultra.limits().monthly_limit, 1500);
    }

    #[test]
    fn lenient_parse_folds_case_and_whitespace() {
        assert_eq!(PlanTier::parse_lenient("ultra"), PlanTier::Ultra);
        assert_eq!(PlanTier::parse_lenient("  ULTRA "), PlanTier::Ultra);
        assert_eq!(PlanTier::parse_lenient("free"), PlanTier::Free);
        assert_eq!(PlanTier::parse_lenient("enterprise"), PlanTier::Free);
        assert_eq!(PlanTier::parse_lenient(""), PlanTier::Free);
    }

    #[test]
    fn serde_roundtrip_is_lenient_on_read() {
        assert_eq!(serde_json::to_string(&PlanTier::Ultra).unwrap(), "\"ultra\"");

        let tier: PlanTier = serde_json::from_str("\"ULTRA\"").unwrap();
        assert_eq!(tier, PlanTier::Ultra);

        // A junk value stored by an old writer degrades to free.
        let tier: PlanTier = serde_json::from_str("\"platinum\"").unwrap();
        assert_eq!(tier, PlanTier::Free);
    }

    #[test]
    fn day_window_starts_at_midnight_utc() {
        let now = at(2025, 3, 14, 15, 9, 26);
        assert_eq!(day_start(now), at(2025, 3, 14, 0, 0, 0));
    }

    #[test]
    fn month_window_starts_on_the_first() {
        let now = at(2025, 3, 14, 15, 9, 26);
        assert_eq!(month_start(now), at(2025, 3, 1, 0, 0, 0));
    }

    #[test]
    fn window_helpers_are_idempotent_at_the_boundary() {
        let midnight = at(2025, 7, 1, 0, 0, 0);
        assert_eq!(day_start(midnight), midnight);
        assert_eq!(month_start(midnight), midnight);
    }

    #[test]
    fn new_profile_is_free() {
        let now = Utc::now();
        let profile = Profile::new(UserId::generate(), now);
        assert_eq!(profile.plan, PlanTier::Free);
        assert_eq!(profile.effective_plan(now), PlanTier::Free);
    }

    #[test]
    fn expired_ultra_degrades_to_free() {
        let now = at(2025, 6, 1, 12, 0, 0);
        let mut profile = Profile::new(UserId::generate(), now);
        profile.plan = PlanTier::Ultra;

        profile.plan_expires_at = None;
        assert_eq!(profile.effective_plan(now), PlanTier::Ultra);

        profile.plan_expires_at = Some(at(2025, 7, 1, 0, 0, 0));
        assert_eq!(profile.effective_plan(now), PlanTier::Ultra);

        profile.plan_expires_at = Some(now);
        assert_eq!(profile.effective_plan(now), PlanTier::Free);

        profile.plan_expires_at = Some(at(2025, 5, 1, 0, 0, 0));
        assert_eq!(profile.effective_plan(now), PlanTier::Free);
    }
}
