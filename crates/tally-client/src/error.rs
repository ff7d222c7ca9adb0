//! Client error types.

/// Errors that can occur when using the tally client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// Insufficient credits; a normal billing outcome. Do not retry.
    #[error("insufficient credits: available={available}, required={required}")]
    InsufficientCredits {
        /// Total available at check time.
        available: i64,
        /// Required amount.
        required: i64,
    },

    /// Unknown or already-consumed top-up code.
    #[error("invalid or expired code")]
    InvalidCode,

    /// The user already holds the upgraded plan.
    #[error("already subscribed: {message}")]
    AlreadySubscribed {
        /// Server-provided detail.
        message: String,
    },

    /// The service cannot serve the request right now; retry later.
    #[error("service not ready: {message}")]
    NotReady {
        /// Server-provided detail.
        message: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
