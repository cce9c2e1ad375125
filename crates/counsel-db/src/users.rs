//! Account repository.

use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use counsel_core::{Error, Result, User, UserStatus};

const USER_COLUMNS: &str =
    "user_id, email, password_hash, is_verified, status, created_at, deleted_at";

/// PostgreSQL-backed account storage.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool<Postgres>,
}

impl PgUserRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn map_row(row: PgRow) -> Result<User> {
        let status: String = row.get("status");
        Ok(User {
            user_id: row.get("user_id"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            is_verified: row.get("is_verified"),
            status: status.parse()?,
            created_at: row.get("created_at"),
            deleted_at: row.get("deleted_at"),
        })
    }

    /// Create an unverified account. Fails with `Conflict` if the email is taken.
    pub async fn create(&self, email: &str, password_hash: &str) -> Result<Uuid> {
        let user_id = Uuid::new_v4();
        let result = sqlx::query(
            "INSERT INTO app_user (user_id, email, password_hash, is_verified, status, created_at)
             VALUES ($1, $2, $3, FALSE, 'active', $4)
             ON CONFLICT (email) DO NOTHING",
        )
        .bind(user_id)
        .bind(email)
        .bind(password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::Conflict("email is already registered".to_string()));
        }
        Ok(user_id)
    }

    /// Create a password-less placeholder account if none exists.
    ///
    /// Returns `true` when a new row was written.
    pub async fn create_pending(&self, email: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO app_user (user_id, email, is_verified, status, created_at)
             VALUES ($1, $2, FALSE, 'active', $3)
             ON CONFLICT (email) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Look up any account, withdrawn or not.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM app_user WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.map(Self::map_row).transpose()
    }

    /// Look up an account that has not been withdrawn.
    pub async fn find_active_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .find_by_email(email)
            .await?
            .filter(|user| !user.is_deleted()))
    }

    pub async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM app_user WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        row.map(Self::map_row).transpose()
    }

    pub async fn exists(&self, email: &str) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM app_user WHERE email = $1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }

    /// Mark an account as email-verified. Returns `false` if no such account.
    pub async fn mark_verified(&self, email: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE app_user SET is_verified = TRUE WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the stored password hash. Returns `false` if no active account.
    pub async fn update_password(&self, email: &str, password_hash: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE app_user SET password_hash = $2
             WHERE email = $1 AND deleted_at IS NULL",
        )
        .bind(email)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Withdraw an account. Returns `false` if it was already withdrawn.
    pub async fn soft_delete(&self, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE app_user SET status = $2, deleted_at = $3
             WHERE user_id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .bind(UserStatus::Deleted.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
