//! Core types and entitlement logic for tally.
//!
//! This crate provides the foundational types used throughout the tally
//! metering platform:
//!
//! - **Identifiers**: `UserId`, `EntryId`, `ApiKeyId`
//! - **Ledger**: `LedgerEntry`, `EntryMetadata`, `CreditSource`
//! - **Plans**: `PlanTier`, `PlanLimits`, `Profile`
//! - **Entitlement**: `Entitlement`, `compute_status`
//! - **Top-ups**: `TopupCode`, code normalization
//! - **API keys**: `ApiKeyRecord`
//!
//! # Credit Unit
//!
//! **1 credit = one successful analysis call.**
//!
//! Credits come from two buckets: the recurring plan quota (reset on UTC
//! day/month windows) and "extra" credits obtained through top-up codes.
//! Balances are never stored; they are always derived by folding the
//! append-only ledger.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod apikey;
pub mod entitlement;
pub mod ids;
pub mod ledger;
pub mod plan;
pub mod topup;

pub use apikey::{ApiKeyRecord, MAX_KEYS_PER_USER};
pub use entitlement::{compute_status, Entitlement};
pub use ids::{ApiKeyId, EntryId, IdError, UserId};
pub use ledger::{CreditSource, EntryMetadata, LedgerEntry, QUOTA_SOURCE};
pub use plan::{day_start, month_start, PlanLimits, PlanTier, Profile};
pub use topup::{normalize_code, CodeError, TopupCode, MIN_CODE_LEN};
