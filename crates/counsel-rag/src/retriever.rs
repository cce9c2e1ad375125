//! Similarity retrieval over the counseling corpus.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use counsel_core::{CounselIndex, EmbeddingBackend, Error, Result, RetrievedDocument};

/// Embeds a question and returns the closest counseling cases.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingBackend>,
    index: Arc<dyn CounselIndex>,
    top_k: usize,
    min_score: f32,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingBackend>,
        index: Arc<dyn CounselIndex>,
        top_k: usize,
        min_score: f32,
    ) -> Self {
        Self {
            embedder,
            index,
            top_k: top_k.max(1),
            min_score,
        }
    }

    /// Best-first hits at or above `min_score`.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedDocument>> {
        let start = Instant::now();

        let query = self
            .embedder
            .embed_texts(&[question.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("No embedding returned for query".to_string()))?;

        let hits = self
            .index
            .search_similar(&query, self.top_k as i64)
            .await?;
        let candidates = hits.len();

        let docs: Vec<RetrievedDocument> = hits
            .into_iter()
            .filter(|doc| doc.score >= self.min_score)
            .collect();

        debug!(
            subsystem = "rag",
            op = "retrieve",
            candidates,
            result_count = docs.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Retrieved counseling cases"
        );
        Ok(docs)
    }
}
