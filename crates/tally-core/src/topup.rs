//! Top-up codes.
//!
//! A top-up code is a single-use token exchangeable for a fixed credit grant.
//! The record lives in the store; this module owns the domain shape and the
//! normalization/validation applied before any storage access.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Minimum accepted code length after normalization.
pub const MIN_CODE_LEN: usize = 3;

/// A redeemable top-up code.
///
/// `redeemed_by` and `redeemed_at` are set together, atomically with the
/// ledger credit, or not at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopupCode {
    /// The normalized code string (also the storage key).
    pub code: String,

    /// Credits granted on redemption.
    pub credits: i64,

    /// Who redeemed the code, once consumed.
    pub redeemed_by: Option<UserId>,

    /// When the code was consumed.
    pub redeemed_at: Option<DateTime<Utc>>,

    /// When the code was minted.
    pub created_at: DateTime<Utc>,
}

impl TopupCode {
    /// Mint a fresh, unredeemed code.
    #[must_use]
    pub fn new(code: String, credits: i64, now: DateTime<Utc>) -> Self {
        Self {
            code,
            credits,
            redeemed_by: None,
            redeemed_at: None,
            created_at: now,
        }
    }

    /// Whether the code has already been consumed.
    #[must_use]
    pub const fn is_redeemed(&self) -> bool {
        self.redeemed_by.is_some()
    }
}

/// Errors rejected before any storage access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeError {
    /// The code is empty or shorter than [`MIN_CODE_LEN`] after trimming.
    #[error("code must be at least {MIN_CODE_LEN} characters")]
    TooShort,
}

/// Normalize a user-entered code: trim surrounding whitespace and upper-case.
///
/// Codes are compared case-insensitively, and leading zeros are significant
/// (codes are strings, never numbers).
///
/// # Errors
///
/// Returns [`CodeError::TooShort`] if the trimmed input is shorter than
/// [`MIN_CODE_LEN`].
pub fn normalize_code(raw: &str) -> Result<String, CodeError> {
    let cleaned = raw.trim().to_uppercase();
    if cleaned.len() < MIN_CODE_LEN {
        return Err(CodeError::TooShort);
    }
    Ok(cleaned)
}
