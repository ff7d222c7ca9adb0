//! Application state.

use std::sync::Arc;

use tally_store::RocksStore;

use crate::config::ServiceConfig;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<RocksStore>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<RocksStore>, config: ServiceConfig) -> Self {
        if config.auth_secret.is_none() {
            tracing::warn!("AUTH_SECRET not configured - user tokens will be rejected");
        }
        if config.service_api_key.is_none() {
            tracing::warn!("SERVICE_API_KEY not configured - charging will be unavailable");
        }

        Self { store, config }
    }
}
