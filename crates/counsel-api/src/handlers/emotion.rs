//! Emotion routes under `/emotion`.
//!
//! Frames are classified by the remote model; predictions at or above
//! [`defaults::EMOTION_SAVE_THRESHOLD`] are recorded against the chatroom.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{Days, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use counsel_core::{
    defaults, final_emotion, most_common_emotion, EmotionLabel, EmotionRecord, EmotionStat,
    NewEmotion,
};
use counsel_inference::ClassifierStatus;

use super::diary::parse_date;
use crate::auth::AuthUser;
use crate::services::sweeper::start_of_day;
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub chatroom_id: String,
    #[serde(default)]
    pub frame: String,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub emotion: EmotionLabel,
    pub confidence: f32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SaveEmotionRequest {
    #[serde(default)]
    pub chatroom_id: String,
    #[serde(default)]
    pub emotion: String,
    pub confidence: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct ChatroomRequest {
    #[serde(default)]
    pub chatroom_id: String,
}

#[derive(Debug, Serialize)]
pub struct ChatroomEmotions {
    pub chatroom_id: String,
    pub emotions: Vec<EmotionRecord>,
    pub most_common: Option<EmotionStat>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

fn require_chatroom(chatroom_id: &str) -> Result<&str, ApiError> {
    let chatroom_id = chatroom_id.trim();
    if chatroom_id.is_empty() {
        return Err(ApiError::BadRequest("chatroom_id is required".to_string()));
    }
    Ok(chatroom_id)
}

fn forbidden() -> ApiError {
    ApiError::Forbidden("Not allowed to access this chatroom".to_string())
}

/// Classify a webcam frame, storing confident predictions.
pub async fn predict(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    let chatroom_id = require_chatroom(&req.chatroom_id)?;
    if req.frame.trim().is_empty() {
        return Err(ApiError::BadRequest("frame is required".to_string()));
    }

    let prediction = state.classifier.classify(&req.frame).await?;
    debug!(
        emotion = %prediction.emotion,
        confidence = prediction.confidence,
        "Frame classified"
    );

    if prediction.confidence < defaults::EMOTION_SAVE_THRESHOLD {
        return Ok(Json(PredictResponse {
            emotion: prediction.emotion,
            confidence: prediction.confidence,
            message: "Confidence below threshold, not saved".to_string(),
            emotion_id: None,
        }));
    }

    let emotion_id = state
        .db
        .emotions
        .save(NewEmotion {
            user_id: auth.user_id,
            chatroom_id: chatroom_id.to_string(),
            emotion: prediction.emotion,
            confidence: prediction.confidence,
            is_final: false,
        })
        .await?;
    Ok(Json(PredictResponse {
        emotion: prediction.emotion,
        confidence: prediction.confidence,
        message: "Emotion saved".to_string(),
        emotion_id: Some(emotion_id),
    }))
}

/// Record an emotion chosen by the client.
pub async fn save_emotion(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<SaveEmotionRequest>,
) -> Result<Json<Value>, ApiError> {
    let chatroom_id = require_chatroom(&req.chatroom_id)?;
    let emotion: EmotionLabel = req.emotion.parse()?;
    let confidence = req
        .confidence
        .filter(|c| (0.0..=1.0).contains(c))
        .ok_or_else(|| ApiError::BadRequest("confidence must be between 0 and 1".to_string()))?;

    let emotion_id = state
        .db
        .emotions
        .save(NewEmotion {
            user_id: auth.user_id,
            chatroom_id: chatroom_id.to_string(),
            emotion,
            confidence,
            is_final: false,
        })
        .await?;
    Ok(Json(json!({ "success": true, "emotion_id": emotion_id })))
}

pub async fn chatroom_results(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chatroom_id): Path<String>,
) -> Result<Json<ChatroomEmotions>, ApiError> {
    let emotions = state
        .db
        .emotions
        .for_chatroom(&chatroom_id, Some(auth.user_id))
        .await?;
    let most_common = most_common_emotion(&emotions);
    Ok(Json(ChatroomEmotions {
        chatroom_id,
        emotions,
        most_common,
    }))
}

pub async fn delete_chatroom_results(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chatroom_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state
        .db
        .emotions
        .is_authorized(auth.user_id, &chatroom_id)
        .await?
    {
        return Err(forbidden());
    }
    let deleted = state.db.emotions.delete_for_chatroom(&chatroom_id).await?;
    Ok(Json(json!({ "success": true, "deleted": deleted })))
}

/// Store the chatroom's dominant emotion as its final record.
pub async fn save_end_emotion(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<ChatroomRequest>,
) -> Result<Json<Value>, ApiError> {
    let chatroom_id = require_chatroom(&req.chatroom_id)?;
    let records = state.db.emotions.for_chatroom(chatroom_id, None).await?;
    if records.is_empty() {
        return Err(ApiError::NotFound(
            "No emotion records for this chatroom".to_string(),
        ));
    }
    if !state
        .db
        .emotions
        .is_authorized(auth.user_id, chatroom_id)
        .await?
    {
        return Err(forbidden());
    }

    let Some(stat) = final_emotion(&records) else {
        return Err(ApiError::NotFound(
            "No emotion records for this chatroom".to_string(),
        ));
    };
    let emotion_id = state
        .db
        .emotions
        .save(NewEmotion {
            user_id: auth.user_id,
            chatroom_id: chatroom_id.to_string(),
            emotion: stat.emotion,
            confidence: stat.avg_confidence,
            is_final: true,
        })
        .await?;
    info!(
        subsystem = "api",
        op = "save_end_emotion",
        emotion = %stat.emotion,
        confidence = stat.avg_confidence,
        "Final chatroom emotion stored"
    );
    Ok(Json(json!({
        "success": true,
        "emotion_id": emotion_id,
        "emotion": stat.emotion,
        "confidence": stat.avg_confidence,
    })))
}

pub async fn history(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<EmotionRecord>>, ApiError> {
    Ok(Json(state.db.emotions.history(auth.user_id).await?))
}

/// Per-emotion counts between two inclusive dates.
pub async fn statistics(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<StatsQuery>,
) -> Result<Json<Value>, ApiError> {
    let start = query
        .start_date
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .map(|d| parse_date(d, "start_date"))
        .transpose()?;
    let end = query
        .end_date
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .map(|d| parse_date(d, "end_date"))
        .transpose()?;

    let start = start.map(|d| d.and_time(NaiveTime::MIN).and_utc());
    // The end date is inclusive, so the bound is the following midnight.
    let end = end
        .and_then(|d| d.checked_add_days(Days::new(1)))
        .map(|d| d.and_time(NaiveTime::MIN).and_utc());

    let stats = state
        .db
        .emotions
        .statistics(auth.user_id, start, end)
        .await?;
    let by_emotion: serde_json::Map<String, Value> = stats
        .into_iter()
        .map(|s| {
            (
                s.emotion.as_str().to_string(),
                json!({ "count": s.count, "avg_confidence": s.avg_confidence }),
            )
        })
        .collect();
    Ok(Json(json!({ "statistics": by_emotion })))
}

/// Public model status.
pub async fn model_status(State(state): State<AppState>) -> Json<ClassifierStatus> {
    Json(state.classifier.status().await)
}

/// End every emotion record from before today. Returns the ended ids.
pub async fn auto_end(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Value>, ApiError> {
    let cutoff = start_of_day(chrono::Utc::now());
    let ended = state.db.emotions.auto_end_before(cutoff).await?;
    Ok(Json(json!({
        "ended_count": ended.len(),
        "ended_ids": ended,
    })))
}
