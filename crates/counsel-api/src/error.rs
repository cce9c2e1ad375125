//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use counsel_crypto::CryptoError;
use tracing::error;

/// API error type. Serialized as `{"error": message}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    TooManyRequests(String),
    BadGateway(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(m)
            | ApiError::Unauthorized(m)
            | ApiError::Forbidden(m)
            | ApiError::NotFound(m)
            | ApiError::Conflict(m)
            | ApiError::TooManyRequests(m)
            | ApiError::BadGateway(m)
            | ApiError::ServiceUnavailable(m)
            | ApiError::Internal(m) => m,
        }
    }
}

impl From<counsel_core::Error> for ApiError {
    fn from(err: counsel_core::Error) -> Self {
        use counsel_core::Error;
        match err {
            Error::NotFound(m) => ApiError::NotFound(m),
            Error::InvalidInput(m) => ApiError::BadRequest(m),
            Error::Unauthorized(m) => ApiError::Unauthorized(m),
            Error::Forbidden(m) => ApiError::Forbidden(m),
            Error::Conflict(m) => ApiError::Conflict(m),
            Error::RateLimited(m) => ApiError::TooManyRequests(m),
            Error::Request(m) | Error::Embedding(m) | Error::Inference(m) => {
                ApiError::BadGateway(m)
            }
            Error::Database(e) => {
                error!(error = %e, "Database error");
                ApiError::Internal("Database error".to_string())
            }
            other => {
                error!(error = %other, "Internal error");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl From<CryptoError> for ApiError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidEmail | CryptoError::WeakPassword(_) => {
                ApiError::BadRequest(err.to_string())
            }
            CryptoError::TokenExpired
            | CryptoError::TokenInvalid(_)
            | CryptoError::WrongTokenKind { .. } => ApiError::Unauthorized(err.to_string()),
            CryptoError::Hash(_) | CryptoError::Encoding(_) => {
                error!(error = %err, "Credential processing failed");
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.message() }));
        (status, body).into_response()
    }
}
