//! In-memory index and chat store for engine and ingestion tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use counsel_core::{
    ChatRecord, ChatRepository, ChatTurn, CounselIndex, Error, NewChat, NewCounselChunk, Result,
    RetrievedDocument, Vector,
};
use counsel_inference::mock::MockEmbeddingGenerator;

#[derive(Default)]
pub struct InMemoryIndex {
    chunks: Mutex<Vec<(Uuid, NewCounselChunk)>>,
    insert_calls: AtomicUsize,
    fail_on_insert: Mutex<Option<usize>>,
    declared_dimension: Option<usize>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index whose vectors must have `dimension` entries, like a `vector(n)` column.
    pub fn with_declared_dimension(dimension: usize) -> Self {
        Self {
            declared_dimension: Some(dimension),
            ..Self::default()
        }
    }

    /// Make the n-th insert call (1-based) fail.
    pub fn fail_on_insert_call(&self, n: usize) {
        *self.fail_on_insert.lock().unwrap() = Some(n);
    }

    pub fn clear_failure(&self) {
        *self.fail_on_insert.lock().unwrap() = None;
    }

    pub fn len(&self) -> usize {
        self.chunks.lock().unwrap().len()
    }

    pub fn rows(&self) -> Vec<(i64, i32)> {
        self.chunks
            .lock()
            .unwrap()
            .iter()
            .map(|(_, c)| (c.row, c.chunk_index))
            .collect()
    }

    /// Store a case whose embedding is the mock embedding of `content`.
    pub fn seed(&self, content: &str, output: Option<&str>, row: i64, dimension: usize) {
        let embedding = Vector::from(MockEmbeddingGenerator::generate(content, dimension));
        self.chunks.lock().unwrap().push((
            Uuid::new_v4(),
            NewCounselChunk {
                source: "seed".to_string(),
                row,
                chunk_index: 0,
                content: content.to_string(),
                output: output.map(str::to_string),
                metadata: serde_json::json!({ "row": row }),
                embedding,
            },
        ));
    }
}

#[async_trait]
impl CounselIndex for InMemoryIndex {
    async fn search_similar(&self, query: &Vector, limit: i64) -> Result<Vec<RetrievedDocument>> {
        let chunks = self.chunks.lock().unwrap();
        let mut hits: Vec<RetrievedDocument> = chunks
            .iter()
            .map(|(id, c)| RetrievedDocument {
                id: *id,
                content: c.content.clone(),
                output: c.output.clone(),
                source: c.source.clone(),
                row: c.row,
                chunk_index: c.chunk_index,
                score: MockEmbeddingGenerator::cosine_similarity(
                    query.as_slice(),
                    c.embedding.as_slice(),
                ),
                metadata: c.metadata.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit.max(0) as usize);
        Ok(hits)
    }

    async fn insert_chunks(&self, new_chunks: Vec<NewCounselChunk>) -> Result<usize> {
        let call = self.insert_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_on_insert.lock().unwrap() == Some(call) {
            return Err(Error::Internal("simulated insert failure".to_string()));
        }

        let mut chunks = self.chunks.lock().unwrap();
        let mut written = 0;
        for chunk in new_chunks {
            let duplicate = chunks.iter().any(|(_, c)| {
                c.source == chunk.source && c.row == chunk.row && c.chunk_index == chunk.chunk_index
            });
            if !duplicate {
                chunks.push((Uuid::new_v4(), chunk));
                written += 1;
            }
        }
        Ok(written)
    }

    async fn count_for_source(&self, source: &str) -> Result<i64> {
        Ok(self
            .chunks
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, c)| c.source == source)
            .count() as i64)
    }

    async fn index_dimension(&self) -> Result<Option<usize>> {
        if self.declared_dimension.is_some() {
            return Ok(self.declared_dimension);
        }
        Ok(self
            .chunks
            .lock()
            .unwrap()
            .first()
            .map(|(_, c)| c.embedding.as_slice().len()))
    }
}

#[derive(Default)]
pub struct InMemoryChats {
    records: Mutex<Vec<ChatRecord>>,
}

impl InMemoryChats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ChatRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn push_turn(&self, user_id: Uuid, session_id: &str, user_message: &str, bot_response: &str) {
        self.records.lock().unwrap().push(ChatRecord {
            id: Uuid::now_v7(),
            user_id,
            session_id: session_id.to_string(),
            user_message: user_message.to_string(),
            bot_response: bot_response.to_string(),
            emotion_id: None,
            confidence: None,
            conversation_end: false,
            timestamp: Utc::now(),
        });
    }
}

#[async_trait]
impl ChatRepository for InMemoryChats {
    async fn save(&self, chat: NewChat) -> Result<Uuid> {
        let id = Uuid::now_v7();
        self.records.lock().unwrap().push(ChatRecord {
            id,
            user_id: chat.user_id,
            session_id: chat.session_id,
            user_message: chat.user_message,
            bot_response: chat.bot_response,
            emotion_id: chat.emotion_id,
            confidence: chat.confidence,
            conversation_end: chat.conversation_end,
            timestamp: Utc::now(),
        });
        Ok(id)
    }

    async fn recent_turns(&self, session_id: &str, limit: i64) -> Result<Vec<ChatTurn>> {
        let records = self.transcript(session_id).await?;
        let skip = records.len().saturating_sub(limit.max(0) as usize);
        Ok(records
            .into_iter()
            .skip(skip)
            .map(|r| ChatTurn::new(r.user_message, r.bot_response))
            .collect())
    }

    async fn transcript(&self, session_id: &str) -> Result<Vec<ChatRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect())
    }
}
