//! Error types for tagsync-catalog

use thiserror::Error;

/// Errors that can occur while talking to the catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Identity service rejected the login or token exchange
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Search service rejected the token or org
    #[error("Search request unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// Search service throttled the request
    #[error("Search rate limited, retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    /// Transient server-side failure (5xx)
    #[error("Search service unavailable ({status}): {message}")]
    Unavailable { status: u16, message: String },

    /// Non-retryable client error (other 4xx)
    #[error("Search request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Request could not be sent or timed out
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Response did not have the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Named resource is not present in the catalog
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CatalogError {
    /// Classify a non-success HTTP status into an error variant.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Unauthorized { status, message },
            429 => Self::RateLimited { retry_after: None },
            500..=599 => Self::Unavailable { status, message },
            _ => Self::Rejected { status, message },
        }
    }

    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) | Self::RateLimited { .. } => true,
            Self::Unavailable { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }
}

/// Result type alias for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;
