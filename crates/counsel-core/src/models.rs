//! Domain models shared across crates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{Error, Vector};

// =============================================================================
// USERS
// =============================================================================

/// Account lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Deleted,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Deleted => "deleted",
        }
    }
}

impl FromStr for UserStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "deleted" => Ok(UserStatus::Deleted),
            other => Err(Error::InvalidInput(format!("unknown user status: {other}"))),
        }
    }
}

/// A registered account.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_verified: bool,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Whether the account has been withdrawn.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some() || self.status == UserStatus::Deleted
    }
}

// =============================================================================
// CHAT
// =============================================================================

/// One stored exchange between a user and the bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_id: String,
    pub user_message: String,
    pub bot_response: String,
    pub emotion_id: Option<Uuid>,
    pub confidence: Option<f32>,
    pub conversation_end: bool,
    pub timestamp: DateTime<Utc>,
}

/// Insert payload for a chat exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct NewChat {
    pub user_id: Uuid,
    pub session_id: String,
    pub user_message: String,
    pub bot_response: String,
    #[serde(default)]
    pub emotion_id: Option<Uuid>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub conversation_end: bool,
}

/// A user/bot pair as held in conversation memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub user_message: String,
    pub bot_response: String,
}

impl ChatTurn {
    pub fn new(user_message: impl Into<String>, bot_response: impl Into<String>) -> Self {
        Self {
            user_message: user_message.into(),
            bot_response: bot_response.into(),
        }
    }
}

/// Builds the session id for a new chat: `{user_id}_{YYYYmmddHHMMSS}`.
pub fn session_id_for(user_id: &Uuid, at: DateTime<Utc>) -> String {
    format!("{}_{}", user_id, at.format("%Y%m%d%H%M%S"))
}

// =============================================================================
// DIARY
// =============================================================================

/// A diary entry written after a counseling session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub chatroom_id: Option<String>,
    pub content: String,
    pub date: NaiveDate,
    pub emotion: String,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Insert payload for a diary entry.
#[derive(Debug, Clone)]
pub struct NewDiary {
    pub user_id: Uuid,
    pub chatroom_id: Option<String>,
    pub content: String,
    pub date: NaiveDate,
    pub emotion: String,
    pub summary: Option<String>,
}

// =============================================================================
// EMOTION
// =============================================================================

/// Facial emotion classes, in classifier output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Happy,
    Sadness,
    Angry,
    Panic,
}

impl EmotionLabel {
    /// All labels, indexed the same way as the classifier's score vector.
    pub const ALL: [EmotionLabel; 4] = [
        EmotionLabel::Happy,
        EmotionLabel::Sadness,
        EmotionLabel::Angry,
        EmotionLabel::Panic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Happy => "happy",
            EmotionLabel::Sadness => "sadness",
            EmotionLabel::Angry => "angry",
            EmotionLabel::Panic => "panic",
        }
    }

    /// Label at a classifier output index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmotionLabel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "happy" => Ok(EmotionLabel::Happy),
            "sadness" => Ok(EmotionLabel::Sadness),
            "angry" => Ok(EmotionLabel::Angry),
            "panic" => Ok(EmotionLabel::Panic),
            other => Err(Error::InvalidInput(format!("unknown emotion: {other}"))),
        }
    }
}

/// A stored emotion observation for a chatroom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionRecord {
    pub emotion_id: Uuid,
    pub user_id: Uuid,
    pub chatroom_id: String,
    pub emotion: EmotionLabel,
    pub confidence: f32,
    /// Set on the record written when a session closes.
    pub is_final: bool,
    pub ended: bool,
    pub timestamp: DateTime<Utc>,
}

/// Insert payload for an emotion observation.
#[derive(Debug, Clone)]
pub struct NewEmotion {
    pub user_id: Uuid,
    pub chatroom_id: String,
    pub emotion: EmotionLabel,
    pub confidence: f32,
    pub is_final: bool,
}

/// Per-emotion aggregate over a set of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionStat {
    pub emotion: EmotionLabel,
    pub count: i64,
    pub avg_confidence: f32,
}

/// Picks the emotion with the most observations.
///
/// Ties go to the label that comes first in classifier order. The returned
/// confidence is the mean confidence of the winning label.
pub fn most_common_emotion(records: &[EmotionRecord]) -> Option<EmotionStat> {
    let mut counts = [(0i64, 0f32); 4];
    for record in records {
        let idx = record.emotion as usize;
        counts[idx].0 += 1;
        counts[idx].1 += record.confidence;
    }

    let (best_idx, (count, total)) = counts
        .iter()
        .enumerate()
        .filter(|(_, (count, _))| *count > 0)
        .fold(None::<(usize, (i64, f32))>, |best, (idx, &entry)| match best {
            Some((_, (best_count, _))) if best_count >= entry.0 => best,
            _ => Some((idx, entry)),
        })?;

    Some(EmotionStat {
        emotion: EmotionLabel::ALL[best_idx],
        count,
        avg_confidence: total / count as f32,
    })
}

/// Summary stored when a chatroom ends. Earlier summaries (`is_final`) are
/// left out so repeating the call does not count its own output.
pub fn final_emotion(records: &[EmotionRecord]) -> Option<EmotionStat> {
    let observations: Vec<EmotionRecord> =
        records.iter().filter(|r| !r.is_final).cloned().collect();
    most_common_emotion(&observations)
}

// =============================================================================
// COUNSELING CORPUS
// =============================================================================

/// A chunk of a past counseling transcript, ready to insert.
#[derive(Debug, Clone)]
pub struct NewCounselChunk {
    pub source: String,
    pub row: i64,
    pub chunk_index: i32,
    pub content: String,
    /// The counselor's reply for the source row, when the corpus has one.
    pub output: Option<String>,
    pub metadata: JsonValue,
    pub embedding: Vector,
}

/// A counseling case returned by similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub id: Uuid,
    pub content: String,
    pub output: Option<String>,
    pub source: String,
    pub row: i64,
    pub chunk_index: i32,
    /// Cosine similarity in `[-1, 1]`, higher is closer.
    pub score: f32,
    pub metadata: JsonValue,
}

/// Whether retrieved cases made it into the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStatus {
    Reflected,
    NotReflected,
}

impl RetrievalStatus {
    pub fn from_hits(hits: usize) -> Self {
        if hits > 0 {
            RetrievalStatus::Reflected
        } else {
            RetrievalStatus::NotReflected
        }
    }
}

// =============================================================================
// LLM MESSAGES
// =============================================================================

/// Speaker of a chat-completion message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat-completion message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
