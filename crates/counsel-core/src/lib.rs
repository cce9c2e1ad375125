//! # counsel-core
//!
//! Shared vocabulary of the counseling backend: the error type, domain
//! models, defaults, and the traits that separate storage and model servers
//! from the RAG engine.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

pub use error::{Error, Result};
pub use models::*;
pub use traits::*;

pub use pgvector::Vector;
