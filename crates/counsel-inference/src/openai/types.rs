//! Wire shapes for the OpenAI-compatible endpoints.
//!
//! Requests borrow from the caller; responses keep only what the backend
//! reads.

use serde::{Deserialize, Serialize};

use counsel_core::ChatMessage;

/// `POST /embeddings`
#[derive(Debug, Serialize)]
pub struct EmbedBody<'a> {
    pub model: &'a str,
    pub input: &'a [String],
    pub encoding_format: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct EmbedReply {
    pub data: Vec<IndexedEmbedding>,
}

/// Embeddings may come back out of order; `index` is the input position.
#[derive(Debug, Deserialize)]
pub struct IndexedEmbedding {
    pub index: usize,
    pub embedding: Vec<f32>,
}

/// `POST /chat/completions`. `ChatMessage` already serializes as
/// `{role, content}` with lowercase roles.
#[derive(Debug, Serialize)]
pub struct CompletionBody<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
pub struct CompletionReply {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ReplyMessage,
}

/// Some servers send `"content": null` for tool or refusal turns.
#[derive(Debug, Deserialize)]
pub struct ReplyMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl CompletionReply {
    /// Text of the first choice, if any.
    pub fn into_text(self) -> Option<String> {
        self.choices.into_iter().next()?.message.content
    }
}

/// `{"error": {...}}` body of a failed call.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub error: UpstreamError,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpstreamError {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}
