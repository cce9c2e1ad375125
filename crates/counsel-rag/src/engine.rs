//! Conversational retrieval-augmented replies.
//!
//! A turn runs: load session memory, condense follow-ups into a standalone
//! question, retrieve similar counseling cases, generate with the persona,
//! prior turns and cases in the prompt, then record the turn.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use counsel_core::{
    defaults, ChatMessage, ChatRecord, ChatRepository, ChatTurn, CounselIndex, EmbeddingBackend,
    Error, GenerationBackend, NewChat, Result, RetrievalStatus, RetrievedDocument,
};

use crate::config::RagConfig;
use crate::memory::ConversationMemory;
use crate::prompt::{render_context, PromptBuilder};
use crate::retriever::Retriever;
use crate::style::StyleExamples;

/// One user turn.
#[derive(Debug, Clone)]
pub struct RagRequest {
    pub user_id: Option<Uuid>,
    pub session_id: String,
    pub message: String,
    pub emotion_id: Option<Uuid>,
    pub confidence: Option<f32>,
    /// Store the exchange. Ignored when there is no user.
    pub persist: bool,
}

impl RagRequest {
    /// Unauthenticated turn in the shared test session; nothing is stored.
    pub fn test_mode(message: impl Into<String>) -> Self {
        Self {
            user_id: None,
            session_id: defaults::TEST_SESSION_ID.to_string(),
            message: message.into(),
            emotion_id: None,
            confidence: None,
            persist: false,
        }
    }

    /// Stored turn for an authenticated user.
    pub fn for_user(user_id: Uuid, session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            session_id: session_id.into(),
            message: message.into(),
            emotion_id: None,
            confidence: None,
            persist: true,
        }
    }

    pub fn with_emotion(mut self, emotion_id: Option<Uuid>, confidence: Option<f32>) -> Self {
        self.emotion_id = emotion_id;
        self.confidence = confidence;
        self
    }
}

/// Where a retrieved case came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub source: String,
    pub row: i64,
    pub chunk_index: i32,
    pub score: f32,
}

impl From<&RetrievedDocument> for Source {
    fn from(doc: &RetrievedDocument) -> Self {
        Self {
            source: doc.source.clone(),
            row: doc.row,
            chunk_index: doc.chunk_index,
            score: doc.score,
        }
    }
}

/// Reply to one turn.
#[derive(Debug, Clone, Serialize)]
pub struct RagResponse {
    pub user_message: String,
    pub retrieved_documents: RetrievalStatus,
    pub bot_response: String,
    /// `None` in test mode.
    pub chat_id: Option<Uuid>,
    pub sources: Vec<Source>,
}

/// Retrieval-augmented counseling engine.
pub struct RagEngine {
    retriever: Retriever,
    generator: Arc<dyn GenerationBackend>,
    chats: Arc<dyn ChatRepository>,
    memory: ConversationMemory,
    style: StyleExamples,
    prompts: PromptBuilder,
    config: RagConfig,
}

impl RagEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingBackend>,
        generator: Arc<dyn GenerationBackend>,
        index: Arc<dyn CounselIndex>,
        chats: Arc<dyn ChatRepository>,
        config: RagConfig,
    ) -> Self {
        let style = StyleExamples::load_optional(config.style_dataset.as_deref());
        info!(
            subsystem = "rag",
            component = "engine",
            top_k = config.top_k,
            memory_turns = config.memory_turns,
            style_pairs = style.len(),
            model = generator.model_name(),
            "Initializing RAG engine"
        );
        Self {
            retriever: Retriever::new(embedder, index, config.top_k, config.min_score),
            generator,
            chats,
            memory: ConversationMemory::new(config.memory_turns, config.memory_sessions),
            style,
            prompts: PromptBuilder::default(),
            config,
        }
    }

    /// Replace the tone dataset.
    pub fn with_style(mut self, style: StyleExamples) -> Self {
        self.style = style;
        self
    }

    pub fn with_prompts(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Answer one user turn.
    #[instrument(skip(self, request), fields(subsystem = "rag", op = "respond", session_id = %request.session_id))]
    pub async fn respond(&self, request: RagRequest) -> Result<RagResponse> {
        let start = Instant::now();
        let message = request.message.trim();
        if message.is_empty() {
            return Err(Error::InvalidInput("user_message must not be empty".to_string()));
        }

        let persist_as = request.user_id.filter(|_| request.persist);
        let history = self
            .load_history(&request.session_id, persist_as.is_some())
            .await?;

        let question = if history.is_empty() {
            message.to_string()
        } else {
            self.condense(&history, message).await?
        };

        let docs = self.retriever.retrieve(&question).await?;
        let status = RetrievalStatus::from_hits(docs.len());
        let context = render_context(&docs);

        let style = self.style.render_sample(self.config.style_examples);
        let mut messages = Vec::with_capacity(history.len() * 2 + 2);
        messages.push(ChatMessage::system(self.prompts.system_prompt(style.as_deref())));
        for turn in &history {
            messages.push(ChatMessage::user(turn.user_message.clone()));
            messages.push(ChatMessage::assistant(turn.bot_response.clone()));
        }
        messages.push(ChatMessage::user(self.prompts.answer_prompt(message, &context)));

        let bot_response = self.generator.chat(&messages).await?.trim().to_string();

        self.memory.append(
            &request.session_id,
            ChatTurn::new(message, bot_response.clone()),
        );

        let chat_id = match persist_as {
            Some(user_id) => Some(
                self.chats
                    .save(NewChat {
                        user_id,
                        session_id: request.session_id.clone(),
                        user_message: message.to_string(),
                        bot_response: bot_response.clone(),
                        emotion_id: request.emotion_id,
                        confidence: request.confidence,
                        conversation_end: false,
                    })
                    .await?,
            ),
            None => None,
        };

        info!(
            history_turns = history.len(),
            result_count = docs.len(),
            response_len = bot_response.len(),
            persisted = chat_id.is_some(),
            duration_ms = start.elapsed().as_millis() as u64,
            "RAG turn complete"
        );

        Ok(RagResponse {
            user_message: message.to_string(),
            retrieved_documents: status,
            sources: docs.iter().map(Source::from).collect(),
            bot_response,
            chat_id,
        })
    }

    /// Retrieved cases for a message, without generating a reply.
    pub async fn preview(&self, message: &str) -> Result<Vec<RetrievedDocument>> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::InvalidInput("user_message must not be empty".to_string()));
        }
        self.retriever.retrieve(message).await
    }

    /// Short diary-style summary of a transcript.
    pub async fn summarize(&self, transcript: &[ChatRecord]) -> Result<String> {
        if transcript.is_empty() {
            return Err(Error::NotFound("No chat messages to summarize".to_string()));
        }
        let summary = self
            .generator
            .generate_with_system(
                self.prompts.summary_system(),
                &self.prompts.summary_prompt(transcript),
            )
            .await?;
        debug!(
            subsystem = "rag",
            op = "summarize",
            input_count = transcript.len(),
            response_len = summary.len(),
            "Summarized session"
        );
        Ok(summary.trim().to_string())
    }

    /// Load a session's transcript and summarize it.
    pub async fn summarize_session(&self, session_id: &str) -> Result<String> {
        let transcript = self.chats.transcript(session_id).await?;
        self.summarize(&transcript).await
    }

    /// Forget a session's memory. Returns whether anything was held.
    pub fn end_session(&self, session_id: &str) -> bool {
        self.memory.clear(session_id)
    }

    async fn load_history(&self, session_id: &str, rehydrate: bool) -> Result<Vec<ChatTurn>> {
        if rehydrate && !self.memory.contains(session_id) {
            let turns = self
                .chats
                .recent_turns(session_id, self.config.memory_turns as i64)
                .await?;
            debug!(
                session_id,
                history_turns = turns.len(),
                "Rehydrated session memory"
            );
            self.memory.seed(session_id, turns);
        }
        Ok(self.memory.history(session_id))
    }

    /// Rewrite a follow-up as a standalone question, keeping the raw message
    /// when the model returns nothing.
    async fn condense(&self, history: &[ChatTurn], message: &str) -> Result<String> {
        let condensed = self
            .generator
            .generate_with_system(
                self.prompts.condense_system(),
                &self.prompts.condense_prompt(history, message),
            )
            .await?;
        let condensed = condensed.trim();
        if condensed.is_empty() {
            warn!("Condensed question was blank, using raw message");
            return Ok(message.to_string());
        }
        Ok(condensed.to_string())
    }
}
