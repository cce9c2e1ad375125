//! Emotion observation repository.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::info;
use uuid::Uuid;

use counsel_core::{EmotionLabel, EmotionRecord, EmotionStat, Error, NewEmotion, Result};

const EMOTION_COLUMNS: &str =
    "emotion_id, user_id, chatroom_id, emotion, confidence, is_final, ended, timestamp";

/// PostgreSQL-backed emotion observations.
#[derive(Clone)]
pub struct PgEmotionRepository {
    pool: Pool<Postgres>,
}

impl PgEmotionRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn map_row(row: PgRow) -> Result<EmotionRecord> {
        let emotion: String = row.get("emotion");
        Ok(EmotionRecord {
            emotion_id: row.get("emotion_id"),
            user_id: row.get("user_id"),
            chatroom_id: row.get("chatroom_id"),
            emotion: emotion.parse()?,
            confidence: row.get("confidence"),
            is_final: row.get("is_final"),
            ended: row.get("ended"),
            timestamp: row.get("timestamp"),
        })
    }

    fn map_rows(rows: Vec<PgRow>) -> Result<Vec<EmotionRecord>> {
        rows.into_iter().map(Self::map_row).collect()
    }

    /// Store an observation and return its generated id.
    pub async fn save(&self, emotion: NewEmotion) -> Result<Uuid> {
        let emotion_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO emotion_record
                (emotion_id, user_id, chatroom_id, emotion, confidence, is_final, timestamp)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(emotion_id)
        .bind(emotion.user_id)
        .bind(&emotion.chatroom_id)
        .bind(emotion.emotion.as_str())
        .bind(emotion.confidence)
        .bind(emotion.is_final)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(emotion_id)
    }

    /// Observations of a chatroom, oldest first, optionally for one user only.
    pub async fn for_chatroom(
        &self,
        chatroom_id: &str,
        user_id: Option<Uuid>,
    ) -> Result<Vec<EmotionRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {EMOTION_COLUMNS} FROM emotion_record
             WHERE chatroom_id = $1 AND ($2::uuid IS NULL OR user_id = $2)
             ORDER BY timestamp ASC"
        ))
        .bind(chatroom_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Self::map_rows(rows)
    }

    /// Remove every observation of a chatroom. Returns `false` if there were none.
    pub async fn delete_for_chatroom(&self, chatroom_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM emotion_record WHERE chatroom_id = $1")
            .bind(chatroom_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Whether `user_id` owns the chatroom's observations.
    ///
    /// True only if the caller has at least one record there and nobody else does.
    pub async fn is_authorized(&self, user_id: Uuid, chatroom_id: &str) -> Result<bool> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) FILTER (WHERE user_id = $2) AS own,
                COUNT(*) FILTER (WHERE user_id <> $2) AS others
             FROM emotion_record WHERE chatroom_id = $1",
        )
        .bind(chatroom_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        let own: i64 = row.get("own");
        let others: i64 = row.get("others");
        Ok(own > 0 && others == 0)
    }

    /// Every observation of a user, newest first.
    pub async fn history(&self, user_id: Uuid) -> Result<Vec<EmotionRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {EMOTION_COLUMNS} FROM emotion_record
             WHERE user_id = $1
             ORDER BY timestamp DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Self::map_rows(rows)
    }

    /// Per-emotion count and mean confidence within `[start, end)`.
    pub async fn statistics(
        &self,
        user_id: Uuid,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<EmotionStat>> {
        let rows = sqlx::query(
            "SELECT emotion, COUNT(*) AS count, AVG(confidence)::real AS avg_confidence
             FROM emotion_record
             WHERE user_id = $1
               AND ($2::timestamptz IS NULL OR timestamp >= $2)
               AND ($3::timestamptz IS NULL OR timestamp < $3)
             GROUP BY emotion",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut stats = rows
            .into_iter()
            .map(|row| {
                let emotion: String = row.get("emotion");
                Ok(EmotionStat {
                    emotion: emotion.parse::<EmotionLabel>()?,
                    count: row.get("count"),
                    avg_confidence: row.get("avg_confidence"),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        stats.sort_by_key(|s| s.emotion);
        Ok(stats)
    }

    /// Mark observations written before `cutoff` as ended. Returns their ids.
    pub async fn auto_end_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "UPDATE emotion_record SET ended = TRUE
             WHERE ended = FALSE AND timestamp < $1
             RETURNING emotion_id",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        if !ids.is_empty() {
            info!(
                subsystem = "db",
                component = "emotions",
                op = "auto_end",
                ended = ids.len(),
                "Closed stale emotion records"
            );
        }
        Ok(ids)
    }
}
