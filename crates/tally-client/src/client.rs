//! Tally HTTP client implementation.

use reqwest::Client;
use std::time::Duration;

use crate::error::ClientError;
use crate::types::{
    ApiErrorResponse, ChargeRequest, ChargeResponse, CheckRequest, CheckResponse,
    PurchaseResponse, RedeemResponse, StatusResponse, VerifyKeyResponse,
};

/// Tally API client.
///
/// Service-authenticated methods (`charge`, `check`, `verify_key`) use the
/// configured service API key; user-facing methods take a session JWT.
#[derive(Debug, Clone)]
pub struct TallyClient {
    client: Client,
    base_url: String,
    api_key: String,
    service_name: String,
}

impl TallyClient {
    /// Create a new tally client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the tally service (e.g. `"http://tally:8080"`)
    /// * `api_key` - Service API key for authentication
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_options(base_url, api_key, ClientOptions::default())
    }

    /// Create a new tally client with custom options.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (should not happen with
    /// default settings).
    #[must_use]
    pub fn with_options(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        options: ClientOptions,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            service_name: options.service_name,
        }
    }

    /// Charge a user for one completed billable unit of work.
    ///
    /// Call this only after the work succeeded; insufficiency comes back as
    /// [`ClientError::InsufficientCredits`] and must not be retried.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn charge(&self, request: ChargeRequest) -> Result<ChargeResponse, ClientError> {
        let url = format!("{}/v1/usage", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
            .json(&request)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Fast-fail availability check before doing expensive billable work.
    ///
    /// The result is a snapshot, not a reservation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn check(
        &self,
        user_id: impl Into<String>,
        required: i64,
    ) -> Result<CheckResponse, ClientError> {
        let url = format!("{}/v1/usage/check", self.base_url);
        let request = CheckRequest {
            user_id: user_id.into(),
            required,
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
            .json(&request)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Resolve a presented user API key to its owner.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn verify_key(
        &self,
        key: impl Into<String>,
    ) -> Result<VerifyKeyResponse, ClientError> {
        let url = format!("{}/v1/keys/verify", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
            .json(&serde_json::json!({ "key": key.into() }))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get a user's entitlement status (requires the user's session JWT).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn credits_status(&self, user_jwt: &str) -> Result<StatusResponse, ClientError> {
        let url = format!("{}/v1/credits/status", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("authorization", format!("Bearer {user_jwt}"))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Redeem a top-up code on behalf of a user.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidCode`] for unknown or consumed codes and
    /// [`ClientError::NotReady`] when the backing store is unavailable.
    pub async fn redeem(
        &self,
        user_jwt: &str,
        code: impl Into<String>,
    ) -> Result<RedeemResponse, ClientError> {
        let url = format!("{}/v1/credits/redeem", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("authorization", format!("Bearer {user_jwt}"))
            .json(&serde_json::json!({ "code": code.into() }))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Upgrade a user to the ultra plan.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AlreadySubscribed`] on duplicate submission.
    pub async fn purchase_upgrade(&self, user_jwt: &str) -> Result<PurchaseResponse, ClientError> {
        let url = format!("{}/v1/plans/purchase", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("authorization", format!("Bearer {user_jwt}"))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Try to parse error response
        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => {
                let code = api_error.error.code.as_str();
                let message = api_error.error.message;

                // Map specific error codes to typed errors
                match code {
                    "insufficient_credits" => {
                        let available = api_error
                            .error
                            .details
                            .as_ref()
                            .and_then(|d| d.get("available"))
                            .and_then(serde_json::Value::as_i64)
                            .unwrap_or(0);
                        let required = api_error
                            .error
                            .details
                            .as_ref()
                            .and_then(|d| d.get("required"))
                            .and_then(serde_json::Value::as_i64)
                            .unwrap_or(0);

                        Err(ClientError::InsufficientCredits {
                            available,
                            required,
                        })
                    }
                    "invalid_code" => Err(ClientError::InvalidCode),
                    "conflict" => Err(ClientError::AlreadySubscribed { message }),
                    "not_ready" => Err(ClientError::NotReady { message }),
                    _ => Err(ClientError::Api {
                        code: code.to_string(),
                        message,
                        status: status.as_u16(),
                    }),
                }
            }
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
    /// Service name to include in requests.
    pub service_name: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            service_name: "unknown".to_string(),
        }
    }
}

impl ClientOptions {
    /// Create options with a service name.
    #[must_use]
    pub fn with_service_name(name: impl Into<String>) -> Self {
        Self {
            service_name: name.into(),
            ..Self::default()
        }
    }
}
