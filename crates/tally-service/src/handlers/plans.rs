//! Plan purchase handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use tally_store::{Store, UpgradeOutcome};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Purchase response.
#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    /// Always true; failures go through the error body.
    pub success: bool,
    /// Human-readable confirmation.
    pub message: String,
}

/// Upgrade the authenticated user to the ultra plan.
///
/// The checkout/payment event itself is handled by an external collaborator;
/// this endpoint records the entitlement transition. It is idempotent against
/// double submission: a second call conflicts instead of double-granting.
pub async fn purchase_upgrade(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<PurchaseResponse>, ApiError> {
    let outcome = state.store.upgrade_plan(&auth.user_id, Utc::now())?;

    match outcome {
        UpgradeOutcome::Upgraded => {
            tracing::info!(user_id = %auth.user_id, "Plan upgraded to ultra");

            Ok(Json(PurchaseResponse {
                success: true,
                message: "Ultra plan activated".to_string(),
            }))
        }
        UpgradeOutcome::AlreadySubscribed => {
            Err(ApiError::Conflict("Ultra plan already active".into()))
        }
    }
}
