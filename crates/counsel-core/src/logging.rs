//! Field names for structured `tracing` events.
//!
//! Every crate logs with these keys so a single query finds, for example,
//! all events of one chat session across the API, RAG and database layers.
//!
//! Levels: ERROR needs an operator, WARN means a fallback was taken, INFO
//! marks lifecycle and completed operations, DEBUG records decisions, TRACE
//! is per-item volume (retrieved cases, chunks).

/// UUIDv7 assigned by the HTTP layer to each request.
pub const REQUEST_ID: &str = "request_id";

/// "api", "rag", "db", "inference", "auth", "ingest".
pub const SUBSYSTEM: &str = "subsystem";

/// Part of a subsystem, e.g. "retriever", "memory", "openai", "mailer".
pub const COMPONENT: &str = "component";

/// Operation name such as "respond", "embed", "classify", "register".
pub const OPERATION: &str = "op";

/// Account uuid. Emails are never logged as identifiers.
pub const USER_ID: &str = "user_id";

/// Chat session, which is also the chatroom id.
pub const SESSION_ID: &str = "session_id";

/// Corpus name during ingestion.
pub const SOURCE: &str = "source";

pub const DURATION_MS: &str = "duration_ms";
pub const RESULT_COUNT: &str = "result_count";
pub const CHUNK_COUNT: &str = "chunk_count";
pub const INPUT_COUNT: &str = "input_count";
pub const PROMPT_LEN: &str = "prompt_len";
pub const RESPONSE_LEN: &str = "response_len";
pub const HISTORY_TURNS: &str = "history_turns";

pub const MODEL: &str = "model";
pub const EMOTION: &str = "emotion";
pub const CONFIDENCE: &str = "confidence";

pub const ERROR: &str = "error";
pub const STATUS: &str = "status";
