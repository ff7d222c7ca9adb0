//! Common test utilities for tally integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use tempfile::TempDir;

use tally_core::UserId;
use tally_service::{create_router, AppState, ServiceConfig};
use tally_store::RocksStore;

/// HS256 secret shared between the harness and the service under test.
const TEST_AUTH_SECRET: &str = "test-secret";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Direct store handle for seeding fixtures.
    pub store: Arc<RocksStore>,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
    /// The service API key for service-to-service requests.
    pub service_api_key: String,
    /// The admin API key for privileged requests.
    pub admin_api_key: String,
}

impl TestHarness {
    /// Create a new test harness with a fresh database.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(RocksStore::open(temp_dir.path()).expect("Failed to open store"));

        let service_api_key = "test-service-key".to_string();
        let admin_api_key = "test-admin-key".to_string();

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            auth_secret: Some(TEST_AUTH_SECRET.into()),
            auth_audience: "tally".into(),
            service_api_key: Some(service_api_key.clone()),
            admin_api_key: Some(admin_api_key.clone()),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        };

        let state = AppState::new(Arc::clone(&store), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");
        let test_user_id = UserId::generate();

        Self {
            server,
            store,
            _temp_dir: temp_dir,
            test_user_id,
            service_api_key,
            admin_api_key,
        }
    }

    /// Get the authorization header for the default test user.
    pub fn user_auth_header(&self) -> String {
        self.auth_header_for(&self.test_user_id)
    }

    /// Get an authorization header for an arbitrary user.
    pub fn auth_header_for(&self, user_id: &UserId) -> String {
        format!("Bearer {}", mint_token(user_id))
    }

    /// Mint a top-up code through the admin endpoint.
    pub async fn mint_code(&self, code: &str, credits: i64) {
        self.server
            .post("/v1/admin/codes")
            .add_header("x-admin-key", self.admin_api_key.clone())
            .json(&serde_json::json!({ "code": code, "credits": credits }))
            .await
            .assert_status_ok();
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Mint a signed session token for a user.
pub fn mint_token(user_id: &UserId) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = serde_json::json!({
        "sub": user_id.to_string(),
        "aud": "tally",
        "exp": now + 3600,
        "iat": now,
    });

    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(TEST_AUTH_SECRET.as_bytes()),
    )
    .expect("Failed to mint test token")
}
