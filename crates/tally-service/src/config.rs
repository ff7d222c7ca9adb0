//! Service configuration.

use serde::Deserialize;
use std::path::Path;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to the `RocksDB` data directory (default: "/data/tally").
    pub data_dir: String,

    /// HS256 secret for validating end-user JWTs. Without it, user
    /// endpoints reject every token.
    pub auth_secret: Option<String>,

    /// Expected JWT audience (default: "tally").
    pub auth_audience: String,

    /// Service API key for service-to-service auth.
    pub service_api_key: Option<String>,

    /// Admin API key for privileged endpoints.
    pub admin_api_key: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

/// Auth secrets file structure.
#[derive(Debug, Deserialize)]
struct AuthSecrets {
    jwt_secret: String,
    #[serde(default)]
    audience: Option<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        // Try to load auth secrets from file first, then fall back to env vars
        let (auth_secret, file_audience) = load_auth_secrets();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/tally".into()),
            auth_secret,
            auth_audience: std::env::var("AUTH_AUDIENCE")
                .ok()
                .or(file_audience)
                .unwrap_or_else(|| "tally".into()),
            service_api_key: std::env::var("SERVICE_API_KEY").ok(),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: std::env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: std::env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        }
    }
}

/// Load the auth secret from file or environment.
fn load_auth_secrets() -> (Option<String>, Option<String>) {
    let secret_paths = [
        ".secrets/auth.json",
        "tally/.secrets/auth.json",
        "../.secrets/auth.json",
    ];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<AuthSecrets>(path) {
            tracing::info!(path = %path, "Loaded auth secrets from file");
            return (Some(secrets.jwt_secret), secrets.audience);
        }
    }

    // Fall back to environment variables
    tracing::debug!("Auth secrets file not found, using environment variables");
    (std::env::var("AUTH_SECRET").ok(), None)
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/tally".into(),
            auth_secret: None,
            auth_audience: "tally".into(),
            service_api_key: None,
            admin_api_key: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}
