//! Chat history repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::info;
use uuid::Uuid;

use counsel_core::{ChatRecord, ChatRepository, ChatTurn, Error, NewChat, Result};

const CHAT_COLUMNS: &str = "id, user_id, session_id, user_message, bot_response, \
                            emotion_id, confidence, conversation_end, timestamp";

/// PostgreSQL-backed chat history.
#[derive(Clone)]
pub struct PgChatRepository {
    pool: Pool<Postgres>,
}

impl PgChatRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn map_row(row: PgRow) -> ChatRecord {
        ChatRecord {
            id: row.get("id"),
            user_id: row.get("user_id"),
            session_id: row.get("session_id"),
            user_message: row.get("user_message"),
            bot_response: row.get("bot_response"),
            emotion_id: row.get("emotion_id"),
            confidence: row.get("confidence"),
            conversation_end: row.get("conversation_end"),
            timestamp: row.get("timestamp"),
        }
    }

    /// Latest `limit` messages of a session, newest first.
    pub async fn history(&self, session_id: &str, limit: i64) -> Result<Vec<ChatRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {CHAT_COLUMNS} FROM chat_message
             WHERE session_id = $1
             ORDER BY timestamp DESC, id DESC
             LIMIT $2"
        ))
        .bind(session_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.into_iter().map(Self::map_row).collect())
    }

    /// Close one session. Returns the number of messages flagged.
    pub async fn end_session(&self, session_id: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE chat_message SET conversation_end = TRUE
             WHERE session_id = $1 AND conversation_end = FALSE",
        )
        .bind(session_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    /// Close every open session of a user.
    pub async fn end_open_for_user(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE chat_message SET conversation_end = TRUE
             WHERE user_id = $1 AND conversation_end = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    /// Close open messages written before `cutoff`.
    pub async fn auto_end_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE chat_message SET conversation_end = TRUE
             WHERE conversation_end = FALSE AND timestamp < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        let ended = result.rows_affected();
        if ended > 0 {
            info!(
                subsystem = "db",
                component = "chats",
                op = "auto_end",
                ended,
                cutoff = %cutoff,
                "Closed stale chat sessions"
            );
        }
        Ok(ended)
    }

    /// Distinct session ids of a user, most recently active first.
    pub async fn sessions_for_user(&self, user_id: Uuid) -> Result<Vec<String>> {
        sqlx::query_scalar(
            "SELECT session_id FROM chat_message
             WHERE user_id = $1
             GROUP BY session_id
             ORDER BY MAX(timestamp) DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }

    /// Owner of a session, if it has any messages.
    pub async fn session_owner(&self, session_id: &str) -> Result<Option<Uuid>> {
        sqlx::query_scalar("SELECT user_id FROM chat_message WHERE session_id = $1 LIMIT 1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)
    }

    /// Delete a single message. Returns `false` if it did not exist.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM chat_message WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn save(&self, chat: NewChat) -> Result<Uuid> {
        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO chat_message
                (id, user_id, session_id, user_message, bot_response,
                 emotion_id, confidence, conversation_end, timestamp)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(id)
        .bind(chat.user_id)
        .bind(&chat.session_id)
        .bind(&chat.user_message)
        .bind(&chat.bot_response)
        .bind(chat.emotion_id)
        .bind(chat.confidence)
        .bind(chat.conversation_end)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(id)
    }

    async fn recent_turns(&self, session_id: &str, limit: i64) -> Result<Vec<ChatTurn>> {
        let mut records = self.history(session_id, limit).await?;
        records.reverse();
        Ok(records
            .into_iter()
            .map(|r| ChatTurn::new(r.user_message, r.bot_response))
            .collect())
    }

    async fn transcript(&self, session_id: &str) -> Result<Vec<ChatRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {CHAT_COLUMNS} FROM chat_message
             WHERE session_id = $1
             ORDER BY timestamp ASC, id ASC"
        ))
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.into_iter().map(Self::map_row).collect())
    }
}
