//! Vector index over chunked counseling transcripts.

use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use pgvector::Vector;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, trace};
use uuid::Uuid;

use counsel_core::{CounselIndex, Error, NewCounselChunk, Result, RetrievedDocument};

/// PostgreSQL + pgvector implementation of [`CounselIndex`].
#[derive(Clone)]
pub struct PgCounselRepository {
    pool: Pool<Postgres>,
}

impl PgCounselRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Total number of stored chunks across all sources.
    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM counsel_chunk")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }

    /// Drop every chunk of a source so it can be re-ingested from scratch.
    pub async fn delete_source(&self, source: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM counsel_chunk WHERE source = $1")
            .bind(source)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl CounselIndex for PgCounselRepository {
    async fn search_similar(&self, query: &Vector, limit: i64) -> Result<Vec<RetrievedDocument>> {
        let start = Instant::now();
        let rows = sqlx::query(
            "SELECT id, content, output, source, row_number, chunk_index, metadata,
                    (1.0 - (embedding <=> $1::vector))::real AS score
             FROM counsel_chunk
             ORDER BY embedding <=> $1::vector
             LIMIT $2",
        )
        .bind(query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let docs: Vec<RetrievedDocument> = rows
            .into_iter()
            .map(|row| RetrievedDocument {
                id: row.get("id"),
                content: row.get("content"),
                output: row.get("output"),
                source: row.get("source"),
                row: row.get("row_number"),
                chunk_index: row.get("chunk_index"),
                score: row.get("score"),
                metadata: row.get("metadata"),
            })
            .collect();

        for doc in &docs {
            trace!(
                subsystem = "db",
                component = "counsel_index",
                doc_id = %doc.id,
                score = doc.score,
                "Retrieved chunk"
            );
        }
        debug!(
            subsystem = "db",
            component = "counsel_index",
            op = "search_similar",
            result_count = docs.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Similarity search complete"
        );
        Ok(docs)
    }

    async fn insert_chunks(&self, chunks: Vec<NewCounselChunk>) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let now = Utc::now();
        let mut written = 0usize;

        for chunk in chunks {
            let result = sqlx::query(
                "INSERT INTO counsel_chunk
                    (id, source, row_number, chunk_index, content, output, metadata, embedding, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                 ON CONFLICT (source, row_number, chunk_index) DO NOTHING",
            )
            .bind(Uuid::now_v7())
            .bind(&chunk.source)
            .bind(chunk.row)
            .bind(chunk.chunk_index)
            .bind(&chunk.content)
            .bind(&chunk.output)
            .bind(&chunk.metadata)
            .bind(&chunk.embedding)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
            written += result.rows_affected() as usize;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(written)
    }

    async fn count_for_source(&self, source: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM counsel_chunk WHERE source = $1")
            .bind(source)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn index_dimension(&self) -> Result<Option<usize>> {
        // pgvector stores the n of vector(n) as the column typmod, -1 when unset.
        let declared: Option<i32> = sqlx::query_scalar(
            "SELECT atttypmod FROM pg_attribute \
             WHERE attrelid = 'counsel_chunk'::regclass AND attname = 'embedding'",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        if let Some(dims) = declared.filter(|d| *d > 0) {
            return Ok(Some(dims as usize));
        }

        let stored: Option<i32> =
            sqlx::query_scalar("SELECT vector_dims(embedding) FROM counsel_chunk LIMIT 1")
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(stored.map(|d| d as usize))
    }
}
