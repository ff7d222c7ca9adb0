//! Tally HTTP API Service.
//!
//! This crate provides the HTTP API for the tally metering service,
//! including:
//!
//! - Entitlement status and ledger history
//! - Top-up code redemption
//! - Plan purchase
//! - Billable-work charging (the deduction protocol entry point)
//! - Per-user API key management
//!
//! # Authentication
//!
//! The service supports three authentication methods:
//!
//! 1. **Bearer JWT tokens** - For end-user requests (dashboard, etc.)
//! 2. **Service API keys** - For service-to-service requests (the analyze
//!    pipeline charging completed work)
//! 3. **Admin keys** - For privileged endpoints (minting top-up codes)

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Some handlers need async for consistency

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
