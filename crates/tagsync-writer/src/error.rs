//! Error types for tagsync-writer

use thiserror::Error;

/// Errors that can occur while building or executing statements.
#[derive(Error, Debug)]
pub enum WriterError {
    /// Warehouse target could not be resolved
    #[error("invalid warehouse target: {0}")]
    InvalidTarget(String),

    /// The warehouse ran the statement and reported a failure
    #[error("statement failed ({state}): {message}")]
    StatementFailed { state: String, message: String },

    /// Statement did not reach a terminal state in time
    #[error("statement '{statement_id}' still running after {waited_secs}s")]
    Timeout {
        statement_id: String,
        waited_secs: u64,
    },

    /// Remote server error
    #[error("remote server error: {status} - {message}")]
    RemoteServer { status: u16, message: String },

    /// Connection error
    #[error("connection failed: {0}")]
    Connection(String),

    /// Response did not have the expected shape
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] tagsync_config::ConfigError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WriterError {
    /// Create an InvalidTarget error.
    pub fn invalid_target(message: impl Into<String>) -> Self {
        Self::InvalidTarget(message.into())
    }

    /// Create a StatementFailed error.
    pub fn statement_failed(state: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StatementFailed {
            state: state.into(),
            message: message.into(),
        }
    }

    /// Create a RemoteServer error.
    pub fn remote_server(status: u16, message: impl Into<String>) -> Self {
        Self::RemoteServer {
            status,
            message: message.into(),
        }
    }

    /// Create a Connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }
}

/// Result type alias for writer operations.
pub type Result<T> = std::result::Result<T, WriterError>;
