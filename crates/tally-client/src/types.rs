//! Request and response types for the tally client.

use serde::{Deserialize, Serialize};

/// Charge request: one completed billable unit of work.
#[derive(Debug, Clone, Serialize)]
pub struct ChargeRequest {
    /// User being charged.
    pub user_id: String,
    /// Credits to charge.
    pub amount: i64,
    /// Which billable operation completed (e.g. `scan_pipeline`).
    pub reason: String,
}

/// Charge response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChargeResponse {
    /// Whether the charge committed.
    pub success: bool,
    /// The appended ledger entry.
    pub entry_id: String,
    /// Which bucket paid: `plan` or `deduction`.
    pub paid_from: String,
}

/// Availability pre-check request.
#[derive(Debug, Clone, Serialize)]
pub struct CheckRequest {
    /// User to check.
    pub user_id: String,
    /// Required amount.
    pub required: i64,
}

/// Availability pre-check response.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckResponse {
    /// Whether the snapshot covers the required amount.
    pub sufficient: bool,
    /// Total available at snapshot time.
    pub total_available: i64,
    /// Required amount echoed back.
    pub required: i64,
}

/// Entitlement status response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Whether the request carried a valid session.
    pub logged_in: bool,
    /// Effective plan tier (`free` or `ultra`).
    pub plan: String,
    /// Plan quota still available in the current windows.
    pub plan_remaining: i64,
    /// Quota units consumed today (UTC).
    pub daily_used: i64,
    /// Quota units consumed this month (UTC).
    pub monthly_used: i64,
    /// Net extra-credit balance.
    pub extra_credits: i64,
    /// Credits spendable right now.
    pub total_available: i64,
}

/// Redemption response.
#[derive(Debug, Clone, Deserialize)]
pub struct RedeemResponse {
    /// Whether the redemption committed.
    pub success: bool,
    /// Credits granted.
    pub credits: i64,
    /// Human-readable confirmation.
    pub message: String,
}

/// Purchase response.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseResponse {
    /// Whether the upgrade committed.
    pub success: bool,
    /// Human-readable confirmation.
    pub message: String,
}

/// API key verification response.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyKeyResponse {
    /// Whether the key resolved.
    pub valid: bool,
    /// Owning user, to be charged for the work.
    pub user_id: String,
    /// Key record ID.
    pub key_id: String,
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details.
    pub error: ApiErrorBody,
}

/// API error body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
    /// Additional details.
    pub details: Option<serde_json::Value>,
}
