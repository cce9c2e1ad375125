//! Diary routes under `/diary`. Every route is scoped to the caller.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use counsel_core::{Diary, NewDiary};

use super::chat::parse_uuid;
use crate::auth::AuthUser;
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct SaveDiaryRequest {
    pub chatroom_id: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub emotion: String,
    pub summary: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub date: Option<String>,
    pub chatroom_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub keyword: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryRequest {
    #[serde(default)]
    pub chatroom_id: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDiaryRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub emotion: String,
}

/// Parse a `YYYY-MM-DD` date.
pub(crate) fn parse_date(value: &str, field: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("{field} must be YYYY-MM-DD")))
}

fn not_found() -> ApiError {
    ApiError::NotFound("Diary not found".to_string())
}

pub async fn save_diary(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<SaveDiaryRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if req.content.trim().is_empty() || req.emotion.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "content, date and emotion are required".to_string(),
        ));
    }
    let date = parse_date(&req.date, "date")?;
    let diary_id = state
        .db
        .diaries
        .create(NewDiary {
            user_id: auth.user_id,
            chatroom_id: req.chatroom_id.filter(|c| !c.trim().is_empty()),
            content: req.content,
            date,
            emotion: req.emotion.trim().to_string(),
            summary: req.summary,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "diary_id": diary_id }))))
}

pub async fn list_diaries(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Diary>>, ApiError> {
    let date = query
        .date
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("date is required".to_string()))?;
    let date = parse_date(date, "date")?;
    let chatroom_id = query.chatroom_id.as_deref().filter(|c| !c.trim().is_empty());
    let diaries = state
        .db
        .diaries
        .list(auth.user_id, date, chatroom_id)
        .await?;
    Ok(Json(diaries))
}

pub async fn search_diaries(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Diary>>, ApiError> {
    let keyword = query
        .keyword
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("keyword is required".to_string()))?;
    let diaries = state.db.diaries.search(auth.user_id, keyword.trim()).await?;
    Ok(Json(diaries))
}

/// Summarize one of the caller's chat sessions for a diary entry.
pub async fn summarize_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<SummaryRequest>,
) -> Result<Json<Value>, ApiError> {
    let chatroom_id = req.chatroom_id.trim();
    if chatroom_id.is_empty() {
        return Err(ApiError::BadRequest("chatroom_id is required".to_string()));
    }
    match state.db.chats.session_owner(chatroom_id).await? {
        Some(owner) if owner != auth.user_id => {
            return Err(ApiError::Forbidden(
                "Chat session belongs to another user".to_string(),
            ))
        }
        Some(_) => {}
        None => return Err(ApiError::NotFound("No chat messages to summarize".to_string())),
    }
    let summary = state.rag.summarize_session(chatroom_id).await?;
    Ok(Json(json!({
        "chatroom_id": chatroom_id,
        "summary": summary,
    })))
}

pub async fn get_diary(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Diary>, ApiError> {
    let id = parse_uuid(&id, "diary id")?;
    let diary = state
        .db
        .diaries
        .get(auth.user_id, id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(diary))
}

pub async fn update_diary(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateDiaryRequest>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_uuid(&id, "diary id")?;
    if req.content.trim().is_empty() || req.emotion.trim().is_empty() {
        return Err(ApiError::BadRequest("content and emotion are required".to_string()));
    }
    if !state
        .db
        .diaries
        .update(auth.user_id, id, &req.content, req.emotion.trim())
        .await?
    {
        return Err(not_found());
    }
    Ok(Json(json!({ "message": "Diary updated" })))
}

pub async fn delete_diary(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_uuid(&id, "diary id")?;
    if !state.db.diaries.delete(auth.user_id, id).await? {
        return Err(not_found());
    }
    Ok(Json(json!({ "message": "Diary deleted" })))
}
