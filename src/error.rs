//! Error types for the revision-pinned asset middleware

use thiserror::Error;

/// Result type alias for middleware operations
pub type Result<T> = std::result::Result<T, RevError>;

/// Error types that can occur while resolving, rewriting, or serving
/// revision-pinned assets
#[derive(Error, Debug, Clone)]
pub enum RevError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid pinned path: {0}")]
    InvalidPath(String),

    #[error("Asset IO error: {0}")]
    AssetIo(String),

    #[error("Transform failed for {path}: {reason}")]
    TransformFailed { path: String, reason: String },

    #[error("HTTP response error: {0}")]
    HttpError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<std::io::Error> for RevError {
    fn from(err: std::io::Error) -> Self {
        RevError::AssetIo(err.to_string())
    }
}

impl From<http::Error> for RevError {
    fn from(err: http::Error) -> Self {
        RevError::HttpError(err.to_string())
    }
}

impl RevError {
    /// Convert error to HTTP status code
    ///
    /// Maps internal errors to the status the server answers with:
    /// - Malformed pinned paths are client errors (400)
    /// - Everything else is a server-side failure (500)
    pub fn to_http_status(&self) -> u16 {
        match self {
            RevError::InvalidPath(_) => 400,

            RevError::ConfigError(_) => 500,
            RevError::AssetIo(_) => 500,
            RevError::TransformFailed { .. } => 500,
            RevError::HttpError(_) => 500,
            RevError::InternalError(_) => 500,
        }
    }

    /// Create a ConfigError from a message
    pub fn config(message: impl Into<String>) -> Self {
        RevError::ConfigError(message.into())
    }

    /// Create a TransformFailed error for a given asset path
    pub fn transform_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        RevError::TransformFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
