//! Trait seams between storage, inference and the RAG engine.

use async_trait::async_trait;

use crate::{ChatMessage, ChatRecord, ChatTurn, NewChat, NewCounselChunk, Result, RetrievedDocument};

// Inference

/// Turns text into vectors for the counseling index.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// One vector per input, in input order.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<crate::Vector>>;

    /// Length every returned vector must have; the index is built for it.
    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// Chat model. Implementors provide [`chat`](Self::chat); the single-prompt
/// helpers wrap it.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.chat(&[ChatMessage::user(prompt)]).await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.chat(&[ChatMessage::system(system), ChatMessage::user(prompt)])
            .await
    }

    fn model_name(&self) -> &str;
}

/// One server that both embeds and generates.
#[async_trait]
pub trait InferenceBackend: EmbeddingBackend + GenerationBackend {
    /// `Ok(false)` when the server is down; `Err` is reserved for
    /// misconfiguration.
    async fn health_check(&self) -> Result<bool>;
}

// Storage

/// Vector index over chunked counseling transcripts.
#[async_trait]
pub trait CounselIndex: Send + Sync {
    /// Nearest chunks by cosine similarity, best first.
    async fn search_similar(
        &self,
        query: &crate::Vector,
        limit: i64,
    ) -> Result<Vec<RetrievedDocument>>;

    /// Insert a batch atomically. Returns the number of rows written.
    async fn insert_chunks(&self, chunks: Vec<NewCounselChunk>) -> Result<usize>;

    /// Number of chunks already stored for a corpus source.
    async fn count_for_source(&self, source: &str) -> Result<i64>;

    /// Vector length the index accepts. A declared column dimension wins;
    /// otherwise the length of stored vectors. `None` when neither is known.
    async fn index_dimension(&self) -> Result<Option<usize>>;
}

/// Chat persistence as seen by the RAG engine.
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Store one exchange, returning its id.
    async fn save(&self, chat: NewChat) -> Result<uuid::Uuid>;

    /// Most recent `limit` turns of a session, oldest first.
    async fn recent_turns(&self, session_id: &str, limit: i64) -> Result<Vec<ChatTurn>>;

    /// Every record of a session, oldest first.
    async fn transcript(&self, session_id: &str) -> Result<Vec<ChatRecord>>;
}
