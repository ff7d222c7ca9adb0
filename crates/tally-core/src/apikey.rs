//! Per-user API key records.
//!
//! API keys gate the public analyze entry point. Only a digest of the secret
//! is ever stored; usage through a key is still subject to the same deduction
//! protocol as session traffic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ApiKeyId, UserId};

/// Maximum number of active keys per user.
pub const MAX_KEYS_PER_USER: usize = 5;

/// A stored API key credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    /// Key record ID (used for revocation).
    pub id: ApiKeyId,

    /// Owning user.
    pub user_id: UserId,

    /// Human-readable label chosen at creation.
    pub label: String,

    /// SHA-256 digest of the secret, hex-encoded. The plaintext key is shown
    /// exactly once at creation and never persisted.
    pub key_hash: String,

    /// Non-secret display hint (`tl_sk_…` plus the final characters).
    pub display_hint: String,

    /// When the key was created.
    pub created_at: DateTime<Utc>,

    /// When the key last authenticated a request.
    pub last_used_at: Option<DateTime<Utc>>,
}
