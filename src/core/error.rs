//! Adapter error types

use thiserror::Error;

/// Errors that can occur while talking to the GLM endpoint
///
/// Malformed SSE records and malformed tool-call arguments never surface here;
/// they are absorbed where they occur.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// Non-2xx HTTP status from the vendor
    #[error("GLM API error ({status}): {body}")]
    Http { status: u16, body: String },

    /// A non-streaming response carried zero choices
    #[error("GLM API returned no choices")]
    NoChoices,

    /// A streaming response arrived without a readable body
    #[error("GLM API streaming response is missing body")]
    MissingBody,

    /// Operation the vendor does not support
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Transport failure before any HTTP status was received
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The caller's cancellation token fired
    #[error("Request cancelled")]
    Cancelled,

    /// Credentials could not be obtained
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Adapter is missing required configuration
    #[error("Not configured: {0}")]
    NotConfigured(String),

    /// A complete (non-streaming) response body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AdapterError {
    /// Create an unsupported-operation error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        AdapterError::Unsupported(msg.into())
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            AdapterError::Http { status, .. } => Some(*status),
            AdapterError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias for adapter operations
pub type AdapterResult<T> = Result<T, AdapterError>;
