//! Per-user API key management handlers.
//!
//! Keys gate the public analyze entry point. The secret is returned exactly
//! once at creation; the store only ever sees its SHA-256 digest, and usage
//! through a key is charged through the same deduction protocol as session
//! traffic.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use tally_core::{ApiKeyId, ApiKeyRecord, MAX_KEYS_PER_USER};
use tally_store::Store;

use crate::auth::{AuthUser, ServiceAuth};
use crate::crypto::{generate_api_key, sha256_hex};
use crate::error::ApiError;
use crate::state::AppState;

/// Key creation request.
#[derive(Debug, Deserialize)]
pub struct CreateKeyRequest {
    /// Human-readable label.
    pub label: String,
}

/// Key creation response. The `key` field is the only time the secret is
/// ever shown.
#[derive(Debug, Serialize)]
pub struct CreateKeyResponse {
    /// Key record ID (for revocation).
    pub id: String,
    /// Label.
    pub label: String,
    /// The plaintext secret. Store it now; it is not retrievable later.
    pub key: String,
    /// Non-secret display hint.
    pub display_hint: String,
    /// Creation timestamp.
    pub created_at: String,
}

/// Create a new API key for the authenticated user.
pub async fn create_key(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreateKeyRequest>,
) -> Result<Json<CreateKeyResponse>, ApiError> {
    let label = body.label.trim();
    if label.is_empty() {
        return Err(ApiError::BadRequest("Label is required".into()));
    }

    let existing = state.store.list_api_keys(&auth.user_id)?;
    if existing.len() >= MAX_KEYS_PER_USER {
        return Err(ApiError::Forbidden(format!(
            "Limit reached: you can only have {MAX_KEYS_PER_USER} active API keys"
        )));
    }

    let (plaintext, key_hash, display_hint) = generate_api_key();
    let record = ApiKeyRecord {
        id: ApiKeyId::generate(),
        user_id: auth.user_id,
        label: label.to_string(),
        key_hash,
        display_hint: display_hint.clone(),
        created_at: Utc::now(),
        last_used_at: None,
    };

    state.store.put_api_key(&record)?;

    tracing::info!(
        user_id = %auth.user_id,
        key_id = %record.id,
        label = %record.label,
        "API key created"
    );

    Ok(Json(CreateKeyResponse {
        id: record.id.to_string(),
        label: record.label,
        key: plaintext,
        display_hint,
        created_at: record.created_at.to_rfc3339(),
    }))
}

/// One key in the listing (no secret material).
#[derive(Debug, Serialize)]
pub struct KeyResponse {
    /// Key record ID.
    pub id: String,
    /// Label.
    pub label: String,
    /// Non-secret display hint.
    pub display_hint: String,
    /// Creation timestamp.
    pub created_at: String,
    /// When the key last authenticated a request.
    pub last_used_at: Option<String>,
}

impl From<&ApiKeyRecord> for KeyResponse {
    fn from(record: &ApiKeyRecord) -> Self {
        Self {
            id: record.id.to_string(),
            label: record.label.clone(),
            display_hint: record.display_hint.clone(),
            created_at: record.created_at.to_rfc3339(),
            last_used_at: record.last_used_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Key listing response.
#[derive(Debug, Serialize)]
pub struct ListKeysResponse {
    /// The user's keys, newest first.
    pub keys: Vec<KeyResponse>,
}

/// List the authenticated user's API keys.
pub async fn list_keys(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ListKeysResponse>, ApiError> {
    let keys = state
        .store
        .list_api_keys(&auth.user_id)?
        .iter()
        .map(KeyResponse::from)
        .collect();

    Ok(Json(ListKeysResponse { keys }))
}

/// Revoke one of the authenticated user's API keys.
pub async fn delete_key(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let key_id: ApiKeyId = id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid key ID".into()))?;

    state
        .store
        .delete_api_key(&auth.user_id, &key_id)
        .map_err(|e| match e {
            tally_store::StoreError::NotFound => ApiError::NotFound("API key not found".into()),
            other => ApiError::from(other),
        })?;

    tracing::info!(user_id = %auth.user_id, key_id = %key_id, "API key revoked");

    Ok(Json(serde_json::json!({ "success": true })))
}

/// Key verification request from the public entry point.
#[derive(Debug, Deserialize)]
pub struct VerifyKeyRequest {
    /// The presented plaintext key.
    pub key: String,
}

/// Key verification response.
#[derive(Debug, Serialize)]
pub struct VerifyKeyResponse {
    /// Always true; unknown keys go through the error body.
    pub valid: bool,
    /// Owning user, to be charged for the work.
    pub user_id: String,
    /// Key record ID.
    pub key_id: String,
}

/// Resolve a presented API key to its owner.
///
/// Called by the public analyze entry point before doing billable work; the
/// caller then charges the resolved user through `POST /v1/usage`, so
/// public-API traffic cannot bypass entitlement.
pub async fn verify_key(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Json(body): Json<VerifyKeyRequest>,
) -> Result<Json<VerifyKeyResponse>, ApiError> {
    let record = state
        .store
        .verify_api_key(&sha256_hex(&body.key), Utc::now())?
        .ok_or_else(|| ApiError::Forbidden("Invalid API key".into()))?;

    Ok(Json(VerifyKeyResponse {
        valid: true,
        user_id: record.user_id.to_string(),
        key_id: record.id.to_string(),
    }))
}
