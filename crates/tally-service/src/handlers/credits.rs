//! Entitlement status, code redemption, and ledger history handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use tally_core::{compute_status, normalize_code, Entitlement, LedgerEntry, PlanTier};
use tally_store::{RedeemOutcome, Store, StoreError};

use crate::auth::{AuthUser, MaybeAuthUser};
use crate::error::ApiError;
use crate::state::AppState;

/// Entitlement status response.
///
/// Field names are camelCase: this is the published shape the dashboard and
/// scanner UI already consume.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Whether the request carried a valid session.
    pub logged_in: bool,
    /// Effective plan tier.
    pub plan: PlanTier,
    /// Plan quota still available in the current windows.
    pub plan_remaining: i64,
    /// Quota units consumed today (UTC).
    pub daily_used: i64,
    /// Quota units consumed this month (UTC).
    pub monthly_used: i64,
    /// Net extra-credit balance (raw signed sum).
    pub extra_credits: i64,
    /// Credits spendable right now.
    pub total_available: i64,
}

impl StatusResponse {
    fn logged_out() -> Self {
        Self::from_snapshot(false, Entitlement::empty(PlanTier::Free))
    }

    fn from_snapshot(logged_in: bool, status: Entitlement) -> Self {
        Self {
            logged_in,
            plan: status.plan,
            plan_remaining: status.plan_remaining,
            daily_used: status.daily_used,
            monthly_used: status.monthly_used,
            extra_credits: status.extra_credits,
            total_available: status.total_available,
        }
    }
}

/// Get the current entitlement snapshot.
///
/// Anonymous requests get HTTP 200 with `loggedIn: false` so public pages can
/// poll without error handling. The snapshot is recomputed from the ledger on
/// every call and is not a reservation.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(auth): MaybeAuthUser,
) -> Result<Json<StatusResponse>, ApiError> {
    let Some(auth) = auth else {
        return Ok(Json(StatusResponse::logged_out()));
    };

    let now = Utc::now();
    let plan = state
        .store
        .get_profile(&auth.user_id)?
        .map_or(PlanTier::Free, |p| p.effective_plan(now));

    let entries = state.store.list_entries(&auth.user_id)?;
    let status = compute_status(plan, &entries, now);

    Ok(Json(StatusResponse::from_snapshot(true, status)))
}

/// Redemption request.
#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    /// The code as typed by the user.
    pub code: String,
}

/// Redemption response.
#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    /// Always true; failures go through the error body.
    pub success: bool,
    /// Credits granted.
    pub credits: i64,
    /// Human-readable confirmation.
    pub message: String,
}

/// Redeem a top-up code.
pub async fn redeem(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<RedeemRequest>,
) -> Result<Json<RedeemResponse>, ApiError> {
    // Normalize and validate before any storage access.
    let code = normalize_code(&body.code)
        .map_err(|_| ApiError::BadRequest("Invalid code format".into()))?;

    let outcome = state
        .store
        .redeem_code(&auth.user_id, &code, Utc::now())
        .map_err(|e| match e {
            // A storage fault during redemption is an operator problem, not
            // a bad code; keep the two signals distinct.
            StoreError::Database(msg) => ApiError::NotReady(msg),
            other => ApiError::from(other),
        })?;

    match outcome {
        RedeemOutcome::Redeemed { credits } => {
            tracing::info!(
                user_id = %auth.user_id,
                credits = %credits,
                "Top-up code redeemed"
            );

            Ok(Json(RedeemResponse {
                success: true,
                credits,
                message: format!("Successfully added {credits} credits!"),
            }))
        }
        RedeemOutcome::Invalid => {
            tracing::warn!(user_id = %auth.user_id, "Redemption failed: invalid code");
            Err(ApiError::InvalidCode)
        }
    }
}

/// Ledger history query parameters.
#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    /// Maximum number of entries to return (default: 50).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// One ledger entry in the history response.
///
/// This row shape is the audit trail and the sole input to balance
/// computation; it must stay backward-readable.
#[derive(Debug, Serialize)]
pub struct LedgerEntryResponse {
    /// Entry ID.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Signed credit delta.
    pub delta: i64,
    /// Origin tag (source plus free-form fields).
    pub metadata: serde_json::Value,
    /// Timestamp.
    pub created_at: String,
}

impl From<&LedgerEntry> for LedgerEntryResponse {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            user_id: entry.user_id.to_string(),
            delta: entry.delta,
            metadata: serde_json::to_value(&entry.metadata)
                .unwrap_or(serde_json::Value::Null),
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

/// Ledger history response.
#[derive(Debug, Serialize)]
pub struct LedgerResponse {
    /// Entries, newest first.
    pub entries: Vec<LedgerEntryResponse>,
    /// Whether there are more entries.
    pub has_more: bool,
}

/// List the authenticated user's ledger history.
pub async fn list_ledger(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<LedgerQuery>,
) -> Result<Json<LedgerResponse>, ApiError> {
    // Fetch one more than requested to determine has_more
    let limit = query.limit.min(100);
    let entries = state
        .store
        .list_entries_page(&auth.user_id, limit + 1, query.offset)?;

    let has_more = entries.len() > limit;
    let entries: Vec<_> = entries
        .iter()
        .take(limit)
        .map(LedgerEntryResponse::from)
        .collect();

    Ok(Json(LedgerResponse { entries, has_more }))
}
