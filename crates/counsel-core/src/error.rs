//! Workspace error type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure shared across the workspace. The HTTP layer maps each variant to
/// a status code, so pick the variant by what the caller did wrong.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The embedding model failed or returned unusable vectors.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// The chat model or the emotion classifier failed.
    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed request data: bad frame, empty message, unknown label.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Outbound HTTP failed (mail relay, model servers).
    #[error("Request error: {0}")]
    Request(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Signed in, but the resource belongs to someone else or the account
    /// is not usable.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Duplicate account and similar.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A throttle window (code resend, password reset) is still open.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
