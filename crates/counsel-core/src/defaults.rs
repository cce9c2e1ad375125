//! Centralized default constants.
//!
//! Every crate reads its fallback values from here instead of defining its
//! own magic numbers. Environment variables override most of them at startup.

// =============================================================================
// CHUNKING
// =============================================================================

/// Maximum characters per chunk for text splitting.
pub const CHUNK_SIZE: usize = 1000;

/// Minimum characters per chunk (smaller trailing pieces are merged).
pub const CHUNK_MIN_SIZE: usize = 100;

/// Overlap characters between adjacent chunks.
pub const CHUNK_OVERLAP: usize = 100;

// =============================================================================
// EMBEDDING / GENERATION
// =============================================================================

/// Default OpenAI-compatible endpoint.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default embedding model.
pub const EMBED_MODEL: &str = "text-embedding-3-small";

/// Vector dimension of `EMBED_MODEL`. Must match the `counsel_chunk` column.
pub const EMBED_DIMENSION: usize = 1536;

/// Default chat model for counseling replies.
pub const GEN_MODEL: &str = "gpt-4o-mini";

/// Sampling temperature for counseling replies.
pub const GEN_TEMPERATURE: f32 = 0.7;

/// Request timeout for model calls, in seconds.
pub const INFERENCE_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// INGESTION
// =============================================================================

/// Chunks committed per ingestion batch (resume granularity).
pub const INGEST_BATCH_SIZE: usize = 2000;

/// Texts per embedding request inside a batch.
pub const EMBED_REQUEST_SIZE: usize = 64;

/// Default corpus source label when none is given.
pub const INGEST_SOURCE: &str = "counseling_corpus";

// =============================================================================
// RETRIEVAL / MEMORY
// =============================================================================

/// Number of counseling cases retrieved per question.
pub const RAG_TOP_K: usize = 4;

/// Minimum cosine similarity for a retrieved case.
pub const RAG_MIN_SCORE: f32 = 0.0;

/// Turns kept per session in conversation memory.
pub const MEMORY_TURNS: usize = 10;

/// Sessions kept in conversation memory before LRU eviction.
pub const MEMORY_SESSIONS: usize = 1000;

/// Number of style examples sampled into the system prompt.
pub const STYLE_EXAMPLES: usize = 5;

/// Session id used by the unauthenticated test-mode endpoint.
pub const TEST_SESSION_ID: &str = "test_session";

// =============================================================================
// CHAT HISTORY
// =============================================================================

/// Default number of messages returned by a session history query.
pub const HISTORY_LIMIT: i64 = 10;

/// Upper bound for a client-supplied history limit.
pub const HISTORY_LIMIT_MAX: i64 = 200;

/// Interval between automatic stale-session sweeps, in seconds.
pub const SESSION_SWEEP_SECS: u64 = 3600;

// =============================================================================
// EMOTION
// =============================================================================

/// Side length of the square classifier input.
pub const EMOTION_INPUT_SIZE: u32 = 224;

/// Predictions below this confidence are returned but not stored.
pub const EMOTION_SAVE_THRESHOLD: f32 = 0.7;

/// Default model-serving endpoint for the face classifier.
pub const EMOTION_MODEL_URL: &str = "http://localhost:8501";

/// Default served model name.
pub const EMOTION_MODEL_NAME: &str = "emotion";

/// Request timeout for the face classifier, in seconds.
pub const EMOTION_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// AUTH
// =============================================================================

/// Lifetime of an emailed verification code, in seconds.
pub const VERIFICATION_CODE_TTL_SECS: u64 = 5 * 60;

/// Minimum interval between verification code requests, in seconds.
pub const VERIFICATION_RESEND_SECS: u64 = 60;

/// How long a registration stays "in progress", in seconds.
pub const REGISTRATION_PENDING_SECS: u64 = 10 * 60;

/// How long a standalone verification request stays pending, in seconds.
pub const PENDING_USER_TTL_SECS: u64 = 60 * 60;

// =============================================================================
// SERVER
// =============================================================================

/// Default listen port.
pub const SERVER_PORT: u16 = 3000;

/// Default request body limit (webcam frames arrive as base64 data URLs).
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Requests per period allowed by the global rate limiter.
pub const RATE_LIMIT_REQUESTS: u64 = 100;

/// Rate limiter period, in seconds.
pub const RATE_LIMIT_PERIOD_SECS: u64 = 60;

/// Base URL used in password reset links.
pub const BASE_URL: &str = "http://localhost:3000";

/// Sender address for outgoing mail.
pub const MAIL_FROM: &str = "no-reply@counsel.local";
