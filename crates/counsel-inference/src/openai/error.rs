//! Mapping upstream failures onto `counsel_core::Error`.

use counsel_core::Error;
use reqwest::Response;

use super::types::ErrorEnvelope;

/// Coarse reason an upstream call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Auth,
    RateLimited,
    MissingModel,
    ContextTooLong,
    Server,
    Other,
}

impl FailureKind {
    pub fn classify(status: u16, kind: &str) -> Self {
        match status {
            401 | 403 => Self::Auth,
            429 => Self::RateLimited,
            404 => Self::MissingModel,
            _ if kind == "model_not_found" => Self::MissingModel,
            400 if kind.contains("context_length") => Self::ContextTooLong,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }

    /// Worth retrying later without changing the request.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::RateLimited | Self::Server)
    }
}

/// Which call failed; embedding and chat failures surface as different variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Embeddings,
    ChatCompletions,
}

impl Endpoint {
    fn wrap(self, detail: String) -> Error {
        match self {
            Endpoint::Embeddings => Error::Embedding(detail),
            Endpoint::ChatCompletions => Error::Inference(detail),
        }
    }
}

/// Misconfiguration (bad key, unknown model) is a `Config` error regardless
/// of the endpoint.
pub fn upstream_error(endpoint: Endpoint, kind: FailureKind, message: &str) -> Error {
    match kind {
        FailureKind::Auth => Error::Config(format!("Model server rejected credentials: {message}")),
        FailureKind::MissingModel => Error::Config(format!("Model not available: {message}")),
        FailureKind::RateLimited => endpoint.wrap(format!("Rate limit reached: {message}")),
        FailureKind::ContextTooLong => endpoint.wrap(format!("Prompt too long: {message}")),
        FailureKind::Server => endpoint.wrap(format!("Model server error: {message}")),
        FailureKind::Other => endpoint.wrap(message.to_string()),
    }
}

/// Read a non-2xx response into an error, keeping the upstream message.
pub(crate) async fn from_response(endpoint: Endpoint, response: Response) -> Error {
    let status = response.status();
    let envelope: ErrorEnvelope = response.json().await.unwrap_or_default();
    let message = if envelope.error.message.is_empty() {
        "no error message"
    } else {
        envelope.error.message.as_str()
    };
    upstream_error(
        endpoint,
        FailureKind::classify(status.as_u16(), &envelope.error.kind),
        &format!("{status}: {message}"),
    )
}
