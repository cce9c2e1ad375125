//! # counsel-db
//!
//! PostgreSQL storage for accounts, chats, diaries and emotion records, and
//! the pgvector index of chunked counseling transcripts.
//!
//! [`Database`] bundles one repository per table over a shared pool.

pub mod chats;
pub mod chunking;
pub mod counsel;
pub mod diaries;
pub mod emotions;
pub mod pool;
pub mod users;

#[cfg(test)]
mod tests;

pub mod test_fixtures;

pub use counsel_core::*;

pub use chats::PgChatRepository;
pub use chunking::{Chunk, Chunker, ChunkerConfig, RecursiveChunker};
pub use counsel::PgCounselRepository;
pub use diaries::PgDiaryRepository;
pub use emotions::PgEmotionRepository;
pub use pool::{create_lazy_pool, create_pool, create_pool_with_config, PoolConfig};
pub use users::PgUserRepository;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Every repository over one pool. Cloning is cheap.
#[derive(Clone)]
pub struct Database {
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub users: PgUserRepository,
    pub chats: PgChatRepository,
    pub diaries: PgDiaryRepository,
    pub emotions: PgEmotionRepository,
    pub counsel: PgCounselRepository,
}

impl Database {
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            users: PgUserRepository::new(pool.clone()),
            chats: PgChatRepository::new(pool.clone()),
            diaries: PgDiaryRepository::new(pool.clone()),
            emotions: PgEmotionRepository::new(pool.clone()),
            counsel: PgCounselRepository::new(pool.clone()),
            pool,
        }
    }

    pub async fn connect(url: &str) -> Result<Self> {
        create_pool(url).await.map(Self::new)
    }

    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        create_pool_with_config(url, config).await.map(Self::new)
    }

    /// No connection is opened until the first query.
    pub fn connect_lazy(url: &str, config: PoolConfig) -> Result<Self> {
        Ok(Self::new(create_lazy_pool(url, config)?))
    }

    /// Apply the SQL files under the workspace `migrations/` directory.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// `SELECT 1` succeeded.
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
