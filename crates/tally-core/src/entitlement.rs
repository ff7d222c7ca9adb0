//! Balance calculation.
//!
//! [`compute_status`] folds a user's ledger into a point-in-time entitlement
//! snapshot. It is a pure projection: no I/O, no clock access, identical
//! output for identical input. Snapshots are never persisted and are not
//! reservations; a concurrent writer can invalidate one immediately.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::LedgerEntry;
use crate::plan::{day_start, month_start, PlanTier};
use crate::QUOTA_SOURCE;

/// A derived point-in-time view of what a user may consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlement {
    /// The plan tier the snapshot was computed for.
    pub plan: PlanTier,

    /// Plan quota still available in the current windows.
    pub plan_remaining: i64,

    /// Quota units consumed since the start of the current UTC day.
    pub daily_used: i64,

    /// Quota units consumed since the start of the current UTC month.
    pub monthly_used: i64,

    /// Net extra-credit balance: the raw signed sum of every entry whose
    /// source is not the quota log. May be negative if a collaborator
    /// over-deducted; the floor is applied only in `total_available`.
    pub extra_credits: i64,

    /// Credits spendable right now: `plan_remaining + max(0, extra_credits)`.
    pub total_available: i64,
}

impl Entitlement {
    /// The all-zero snapshot for a user with an empty ledger on a plan with
    /// no remaining quota, or for an unauthenticated status probe.
    #[must_use]
    pub fn empty(plan: PlanTier) -> Self {
        Self {
            plan,
            plan_remaining: 0,
            daily_used: 0,
            monthly_used: 0,
            extra_credits: 0,
            total_available: 0,
        }
    }

    /// Whether the snapshot covers a charge of `amount`.
    ///
    /// This is a fast-fail check only; it can be stale by the time a
    /// deduction commits, so the deduction re-verifies under its own lock.
    #[must_use]
    pub const fn can_cover(&self, amount: i64) -> bool {
        self.total_available >= amount
    }
}

/// Compute a user's entitlement snapshot from their plan and full ledger.
///
/// Usage counters sum the magnitudes of negative quota-log entries
/// (`source == plan`) inside the current UTC day/month windows. The
/// extra-credit balance is the raw signed sum of everything else. Both caps
/// bind: plan quota remaining is the lesser of what the daily and monthly
/// windows still allow.
#[must_use]
pub fn compute_status(plan: PlanTier, entries: &[LedgerEntry], now: DateTime<Utc>) -> Entitlement {
    let limits = plan.limits();
    let day = day_start(now);
    let month = month_start(now);

    let mut daily_used = 0i64;
    let mut monthly_used = 0i64;
    let mut extra_credits = 0i64;

    for entry in entries {
        if entry.metadata.source == QUOTA_SOURCE {
            if entry.delta < 0 {
                if entry.created_at >= month {
                    monthly_used += -entry.delta;
                }
                if entry.created_at >= day {
                    daily_used += -entry.delta;
                }
            }
        } else {
            extra_credits += entry.delta;
        }
    }

    let daily_remaining = (limits.daily_limit - daily_used).max(0);
    let monthly_remaining = (limits.monthly_limit - monthly_used).max(0);
    let plan_remaining = daily_remaining.min(monthly_remaining);

    Entitlement {
        plan,
        plan_remaining,
        daily_used,
        monthly_used,
        extra_credits,
        total_available: plan_remaining + extra_credits.max(0),
    }
}
