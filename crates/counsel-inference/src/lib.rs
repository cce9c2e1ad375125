//! # counsel-inference
//!
//! Model backends for the counseling backend.
//!
//! This crate provides:
//! - OpenAI-compatible embedding and chat completion backend
//! - Webcam frame decoding and the facial emotion classifier client
//! - Mock backends for tests (feature `mock`)
//!
//! # Example
//!
//! ```rust,no_run
//! use counsel_inference::OpenAIBackend;
//! use counsel_core::EmbeddingBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OpenAIBackend::from_env().unwrap();
//!     let texts = vec!["요즘 잠이 안 와요".to_string()];
//!     let embeddings = backend.embed_texts(&texts).await.unwrap();
//!     assert_eq!(embeddings.len(), 1);
//! }
//! ```

pub mod emotion;
pub mod openai;

// Mock backends for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use emotion::{
    decode_frame, preprocess, ClassifierStatus, EmotionClassifier, EmotionModelConfig,
    EmotionPrediction, RemoteEmotionClassifier,
};
pub use openai::{OpenAIBackend, OpenAIConfig};
