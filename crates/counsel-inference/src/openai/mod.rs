//! OpenAI-compatible backend.
//!
//! Works with any server exposing `/embeddings`, `/chat/completions` and
//! `/models` in the OpenAI wire format.

mod backend;
pub mod error;
pub mod types;

pub use backend::{OpenAIBackend, OpenAIConfig};
pub use error::FailureKind;
