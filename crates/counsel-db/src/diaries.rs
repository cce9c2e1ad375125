//! Diary repository.

use chrono::{NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use counsel_core::{Diary, Error, NewDiary, Result};

use crate::escape_like;

const DIARY_COLUMNS: &str =
    "id, user_id, chatroom_id, content, date, emotion, summary, created_at, updated_at";

/// PostgreSQL-backed diary storage. Every query is scoped to the owning user.
#[derive(Clone)]
pub struct PgDiaryRepository {
    pool: Pool<Postgres>,
}

impl PgDiaryRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn map_row(row: PgRow) -> Diary {
        Diary {
            id: row.get("id"),
            user_id: row.get("user_id"),
            chatroom_id: row.get("chatroom_id"),
            content: row.get("content"),
            date: row.get("date"),
            emotion: row.get("emotion"),
            summary: row.get("summary"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    pub async fn create(&self, diary: NewDiary) -> Result<Uuid> {
        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO diary (id, user_id, chatroom_id, content, date, emotion, summary, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(id)
        .bind(diary.user_id)
        .bind(&diary.chatroom_id)
        .bind(&diary.content)
        .bind(diary.date)
        .bind(&diary.emotion)
        .bind(&diary.summary)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(id)
    }

    /// Diaries of a user on one date, optionally narrowed to a chatroom.
    pub async fn list(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        chatroom_id: Option<&str>,
    ) -> Result<Vec<Diary>> {
        let rows = sqlx::query(&format!(
            "SELECT {DIARY_COLUMNS} FROM diary
             WHERE user_id = $1 AND date = $2
               AND ($3::text IS NULL OR chatroom_id = $3)
             ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .bind(date)
        .bind(chatroom_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.into_iter().map(Self::map_row).collect())
    }

    pub async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<Diary>> {
        let row = sqlx::query(&format!(
            "SELECT {DIARY_COLUMNS} FROM diary WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.map(Self::map_row))
    }

    /// Rewrite content and emotion. Returns `false` if no such diary.
    pub async fn update(
        &self,
        user_id: Uuid,
        id: Uuid,
        content: &str,
        emotion: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE diary SET content = $3, emotion = $4, updated_at = $5
             WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .bind(content)
        .bind(emotion)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM diary WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Case-insensitive substring search over diary content.
    pub async fn search(&self, user_id: Uuid, keyword: &str) -> Result<Vec<Diary>> {
        let pattern = format!("%{}%", escape_like(keyword));
        let rows = sqlx::query(&format!(
            "SELECT {DIARY_COLUMNS} FROM diary
             WHERE user_id = $1 AND content ILIKE $2 ESCAPE '\\'
             ORDER BY date DESC, created_at DESC"
        ))
        .bind(user_id)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(rows.into_iter().map(Self::map_row).collect())
    }
}
