//! Chat routes under `/chat`: session bookkeeping, stored messages and the
//! counseling replies.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use counsel_core::{defaults, session_id_for, ChatRecord, ChatRepository, NewChat};
use counsel_rag::{RagRequest, RagResponse};

use crate::auth::AuthUser;
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaveMessageRequest {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub user_message: Option<String>,
    pub bot_response: Option<String>,
    pub emotion_id: Option<Uuid>,
    pub confidence: Option<f32>,
    #[serde(default)]
    pub conversation_end: bool,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub history: Vec<ChatRecord>,
}

#[derive(Debug, Deserialize)]
pub struct UserMessageRequest {
    #[serde(default)]
    pub user_message: String,
}

#[derive(Debug, Deserialize)]
pub struct ConversationRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub user_message: String,
    pub emotion_id: Option<Uuid>,
    pub confidence: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct PreviewDocument {
    pub content: String,
    pub output: Option<String>,
    pub source: String,
    pub row: i64,
    pub score: f32,
}

pub(crate) fn parse_uuid(value: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(value.trim()).map_err(|_| ApiError::BadRequest(format!("Invalid {what}")))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Open a new session, ending the user's previous ones.
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let user_id = non_blank(req.user_id)
        .ok_or_else(|| ApiError::BadRequest("user_id is required".to_string()))?;
    let user_id = parse_uuid(&user_id, "user_id")?;

    let ended = state.db.chats.end_open_for_user(user_id).await?;
    let session_id = session_id_for(&user_id, Utc::now());
    info!(
        subsystem = "api",
        op = "create_session",
        user_id = %user_id,
        session_id = %session_id,
        ended,
        "Session opened"
    );
    Ok((StatusCode::CREATED, Json(json!({ "session_id": session_id }))))
}

/// Store an exchange produced elsewhere.
pub async fn save_message(
    State(state): State<AppState>,
    Json(req): Json<SaveMessageRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let missing = || ApiError::BadRequest("Missing required fields".to_string());
    let user_id = parse_uuid(&non_blank(req.user_id).ok_or_else(missing)?, "user_id")?;
    let chat = NewChat {
        user_id,
        session_id: non_blank(req.session_id).ok_or_else(missing)?,
        user_message: non_blank(req.user_message).ok_or_else(missing)?,
        bot_response: non_blank(req.bot_response).ok_or_else(missing)?,
        emotion_id: req.emotion_id,
        confidence: req.confidence,
        conversation_end: req.conversation_end,
    };
    let chat_id = state.db.chats.save(chat).await?;
    Ok((StatusCode::CREATED, Json(json!({ "chat_id": chat_id }))))
}

/// Messages of a session, newest first.
pub async fn session_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(defaults::HISTORY_LIMIT)
        .clamp(1, defaults::HISTORY_LIMIT_MAX);
    let history = state.db.chats.history(&session_id, limit).await?;
    Ok(Json(HistoryResponse {
        session_id,
        history,
    }))
}

/// End a session and drop its conversation memory.
pub async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let ended = state.db.chats.end_session(&session_id).await?;
    state.rag.end_session(&session_id);
    Ok(Json(json!({
        "message": "Session ended",
        "ended": ended,
    })))
}

/// Distinct session ids of a user.
pub async fn user_sessions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user_id = parse_uuid(&user_id, "user_id")?;
    let sessions = state.db.chats.sessions_for_user(user_id).await?;
    Ok(Json(json!({ "sessions": sessions })))
}

pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_uuid(&message_id, "message id")?;
    if !state.db.chats.delete(id).await? {
        return Err(ApiError::NotFound("Message not found".to_string()));
    }
    Ok(Json(json!({ "message": "Message deleted" })))
}

/// Cases that would ground a reply, without generating one.
pub async fn preview(
    State(state): State<AppState>,
    Json(req): Json<UserMessageRequest>,
) -> Result<Json<Value>, ApiError> {
    let docs = state.rag.preview(&req.user_message).await?;
    let docs: Vec<PreviewDocument> = docs
        .into_iter()
        .map(|doc| PreviewDocument {
            content: doc.content,
            output: doc.output,
            source: doc.source,
            row: doc.row,
            score: doc.score,
        })
        .collect();
    Ok(Json(json!({ "retrieved_documents": docs })))
}

/// Unauthenticated reply in the shared test session. Nothing is stored.
pub async fn rag_response(
    State(state): State<AppState>,
    Json(req): Json<UserMessageRequest>,
) -> Result<Json<RagResponse>, ApiError> {
    let response = state
        .rag
        .respond(RagRequest::test_mode(req.user_message))
        .await?;
    Ok(Json(response))
}

/// Reply for the authenticated user; the exchange is stored.
pub async fn conversation(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ConversationRequest>,
) -> Result<Json<RagResponse>, ApiError> {
    if req.session_id.trim().is_empty() {
        return Err(ApiError::BadRequest("session_id is required".to_string()));
    }
    if let Some(owner) = state.db.chats.session_owner(&req.session_id).await? {
        if owner != auth.user_id {
            return Err(ApiError::Forbidden(
                "Session belongs to another user".to_string(),
            ));
        }
    }
    let response = state
        .rag
        .respond(
            RagRequest::for_user(auth.user_id, req.session_id, req.user_message)
                .with_emotion(req.emotion_id, req.confidence),
        )
        .await?;
    Ok(Json(response))
}
