//! Error types for the Apify client.

use thiserror::Error;

/// Result type for Apify client operations.
pub type Result<T> = std::result::Result<T, ApifyError>;

/// Apify client errors.
#[derive(Debug, Error)]
pub enum ApifyError {
    /// Transport failure (connection refused, timeout, TLS)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-2xx response from the Apify API
    #[error("Apify API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Actor run reached a terminal non-success status
    #[error("Actor run ended with status {0}")]
    RunFailed(String),

    /// Request could not be built (bad search URL, invalid input)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApifyError {
    /// HTTP status of the failed call, when the API answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApifyError::Api { status, .. } => Some(*status),
            ApifyError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
