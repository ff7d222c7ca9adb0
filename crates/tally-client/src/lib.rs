//! Tally Client SDK.
//!
//! This crate provides a client library for services that bill work through
//! tally and for dashboards that read entitlement status.
//!
//! # Example
//!
//! ```no_run
//! use tally_client::{ChargeRequest, TallyClient};
//!
//! # async fn example() -> Result<(), tally_client::ClientError> {
//! let client = TallyClient::new("http://tally:8080", "your-service-api-key");
//!
//! // Charge one credit after the billable work succeeded.
//! let response = client
//!     .charge(ChargeRequest {
//!         user_id: "user-uuid".to_string(),
//!         amount: 1,
//!         reason: "scan_pipeline".to_string(),
//!     })
//!     .await?;
//!
//! println!("charged from {}", response.paid_from);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, TallyClient};
pub use error::ClientError;
pub use types::*;
