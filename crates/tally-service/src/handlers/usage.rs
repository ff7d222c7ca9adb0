//! Billable-work charging handlers.
//!
//! These endpoints are the deduction protocol's HTTP surface. They are
//! service-authenticated: only internal billable-operation handlers call
//! them, and only after the paid work has succeeded.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use tally_core::{compute_status, PlanTier, UserId};
use tally_store::{DeductOutcome, Store};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Charge request from a billable-operation handler.
#[derive(Debug, Deserialize)]
pub struct ChargeRequest {
    /// User being charged.
    pub user_id: String,
    /// Credits to charge (default: 1).
    #[serde(default = "default_amount")]
    pub amount: i64,
    /// Which billable operation completed (e.g. `scan_pipeline`).
    pub reason: String,
}

fn default_amount() -> i64 {
    1
}

/// Charge response.
#[derive(Debug, Serialize)]
pub struct ChargeResponse {
    /// Whether the charge committed.
    pub success: bool,
    /// The appended ledger entry.
    pub entry_id: String,
    /// Which bucket paid: `plan` or `deduction`.
    pub paid_from: String,
}

/// Charge a user for one completed billable unit of work.
///
/// Callers must invoke this only after the work succeeded; on failure of the
/// work nothing is ever written. The store re-verifies availability under the
/// user's mutex, so a stale pre-check cannot overdraw the balance.
pub async fn charge(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<ChargeRequest>,
) -> Result<Json<ChargeResponse>, ApiError> {
    let user_id: UserId = body
        .user_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid user ID".into()))?;

    if body.amount < 1 {
        return Err(ApiError::BadRequest("Amount must be at least 1".into()));
    }
    if body.reason.trim().is_empty() {
        return Err(ApiError::BadRequest("Reason is required".into()));
    }

    let now = Utc::now();
    let plan = state
        .store
        .get_profile(&user_id)?
        .map_or(PlanTier::Free, |p| p.effective_plan(now));

    let outcome = state
        .store
        .deduct(&user_id, plan, body.amount, body.reason.trim(), now)?;

    match outcome {
        DeductOutcome::Charged {
            entry_id,
            paid_from,
        } => {
            tracing::info!(
                service = %auth.service_name,
                user_id = %user_id,
                amount = %body.amount,
                reason = %body.reason,
                paid_from = %paid_from,
                "Charge committed"
            );

            Ok(Json(ChargeResponse {
                success: true,
                entry_id: entry_id.to_string(),
                paid_from: paid_from.to_string(),
            }))
        }
        DeductOutcome::InsufficientFunds { available } => Err(ApiError::InsufficientCredits {
            available,
            required: body.amount,
        }),
    }
}

/// Pre-check request.
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    /// User to check.
    pub user_id: String,
    /// Required amount (default: 1).
    #[serde(default = "default_amount")]
    pub required: i64,
}

/// Pre-check response.
#[derive(Debug, Serialize)]
pub struct CheckResponse {
    /// Whether the snapshot covers the required amount.
    pub sufficient: bool,
    /// Total available at snapshot time.
    pub total_available: i64,
    /// Required amount echoed back.
    pub required: i64,
}

/// Fast-fail availability check before doing expensive billable work.
///
/// This is an optimization, not a reservation: the snapshot can be stale by
/// the time the work finishes, and the charge re-verifies on its own.
pub async fn check(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(body): Json<CheckRequest>,
) -> Result<Json<CheckResponse>, ApiError> {
    let user_id: UserId = body
        .user_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid user ID".into()))?;

    let now = Utc::now();
    let plan = state
        .store
        .get_profile(&user_id)?
        .map_or(PlanTier::Free, |p| p.effective_plan(now));

    let entries = state.store.list_entries(&user_id)?;
    let status = compute_status(plan, &entries, now);

    Ok(Json(CheckResponse {
        sufficient: status.can_cover(body.required),
        total_available: status.total_available,
        required: body.required,
    }))
}
