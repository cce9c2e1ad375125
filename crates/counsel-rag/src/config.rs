//! Retrieval and memory settings.

use std::path::PathBuf;

use counsel_core::defaults;

/// Configuration for [`crate::RagEngine`].
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Cases retrieved per question.
    pub top_k: usize,
    /// Hits scoring below this cosine similarity are dropped.
    pub min_score: f32,
    /// Turns kept per session.
    pub memory_turns: usize,
    /// Sessions kept before least-recently-used eviction.
    pub memory_sessions: usize,
    /// CSV of `original,converted` tone pairs.
    pub style_dataset: Option<PathBuf>,
    /// Style pairs sampled into each system prompt.
    pub style_examples: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: defaults::RAG_TOP_K,
            min_score: defaults::RAG_MIN_SCORE,
            memory_turns: defaults::MEMORY_TURNS,
            memory_sessions: defaults::MEMORY_SESSIONS,
            style_dataset: None,
            style_examples: defaults::STYLE_EXAMPLES,
        }
    }
}

impl RagConfig {
    /// Read `RAG_*` environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            top_k: env_parse("RAG_TOP_K").unwrap_or(base.top_k),
            min_score: env_parse("RAG_MIN_SCORE").unwrap_or(base.min_score),
            memory_turns: env_parse("RAG_MEMORY_TURNS").unwrap_or(base.memory_turns),
            memory_sessions: env_parse("RAG_MEMORY_SESSIONS").unwrap_or(base.memory_sessions),
            style_dataset: std::env::var("RAG_STYLE_DATASET")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            style_examples: env_parse("RAG_STYLE_EXAMPLES").unwrap_or(base.style_examples),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
