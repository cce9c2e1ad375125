//! # counsel-rag
//!
//! Retrieval-augmented counseling replies.
//!
//! This crate provides:
//! - Similarity retrieval over chunked counseling cases
//! - Per-session conversation memory with LRU eviction
//! - Persona, tone and context prompt assembly
//! - The [`RagEngine`] that ties them to a generation backend
//! - Resumable corpus ingestion and the `counsel-ingest` CLI

pub mod config;
pub mod engine;
pub mod ingest;
pub mod memory;
pub mod prompt;
pub mod retriever;
pub mod style;

pub use config::RagConfig;
pub use engine::{RagEngine, RagRequest, RagResponse, Source};
pub use ingest::{CorpusDocument, CsvCorpusLoader, IngestPipeline, IngestReport};
pub use memory::ConversationMemory;
pub use prompt::{render_context, PromptBuilder, NO_CONTEXT};
pub use retriever::Retriever;
pub use style::{StyleExamples, StylePair};
