//! Error types for credential and token operations.

use thiserror::Error;

/// Credential and token errors.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Email does not look like an address.
    #[error("Invalid email format")]
    InvalidEmail,

    /// Password fails the policy; the message names the unmet rule.
    #[error("{0}")]
    WeakPassword(String),

    /// Hashing parameters or the stored hash are unusable.
    #[error("Password hashing failed: {0}")]
    Hash(String),

    /// Token signature was valid but it has expired.
    #[error("Token has expired")]
    TokenExpired,

    /// Token is malformed or the signature does not verify.
    #[error("Invalid token: {0}")]
    TokenInvalid(String),

    /// Token verified but is of the wrong kind for this use.
    #[error("Expected {expected} token, got {actual}")]
    WrongTokenKind {
        expected: &'static str,
        actual: &'static str,
    },

    /// Token could not be produced.
    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

/// Result type for credential and token operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
