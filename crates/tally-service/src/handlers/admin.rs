//! Admin handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use tally_core::{normalize_code, TopupCode};
use tally_store::Store;

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Code minting request.
#[derive(Debug, Deserialize)]
pub struct MintCodeRequest {
    /// The code string (normalized before storage).
    pub code: String,
    /// Credits the code grants.
    pub credits: i64,
}

/// Code minting response.
#[derive(Debug, Serialize)]
pub struct MintCodeResponse {
    /// The normalized code as stored.
    pub code: String,
    /// Credits the code grants.
    pub credits: i64,
}

/// Mint a top-up code.
///
/// The checkout collaborator calls this after a paid top-up; operators use
/// it for promotional grants. Codes are single-use and cannot be re-minted
/// while they exist.
pub async fn mint_code(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Json(body): Json<MintCodeRequest>,
) -> Result<Json<MintCodeResponse>, ApiError> {
    let code = normalize_code(&body.code)
        .map_err(|_| ApiError::BadRequest("Invalid code format".into()))?;

    if body.credits < 1 {
        return Err(ApiError::BadRequest("Credits must be at least 1".into()));
    }

    if state.store.get_code(&code)?.is_some() {
        return Err(ApiError::Conflict("Code already exists".into()));
    }

    let record = TopupCode::new(code.clone(), body.credits, Utc::now());
    state.store.put_code(&record)?;

    tracing::info!(
        admin_id = %auth.admin_id,
        code = %code,
        credits = %body.credits,
        "Top-up code minted"
    );

    Ok(Json(MintCodeResponse {
        code,
        credits: body.credits,
    }))
}
