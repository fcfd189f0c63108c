//! Error types for the application

use thiserror::Error;

/// Result type alias using our ClientError
pub type Result<T> = std::result::Result<T, ClientError>;

/// Main error type for client operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request errors
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Invalid API response
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Upstream business error (well-formed error envelope)
    #[error("Exchange error {status_code}: {message}")]
    Exchange { status_code: String, message: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Computation would produce a garbage numeric result
    #[error("Data inconsistency: {0}")]
    DataInconsistency(String),

    /// Subscription store errors
    #[error("Store error: {0}")]
    Store(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Build an Exchange error from a normalized upstream response.
    pub fn exchange(status_code: impl Into<String>, message: impl Into<String>) -> Self {
        ClientError::Exchange {
            status_code: status_code.into(),
            message: message.into(),
        }
    }
}
