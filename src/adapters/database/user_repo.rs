use crate::adapters::database::DbPool;
use crate::adapters::database::records::UserRecord;
use crate::domain::password_reset::PendingReset;
use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::services::ports::UserRepository;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, password_hash, reset_token, reset_token_expires_at, created_at";

#[derive(Clone, Debug)]
pub struct PgUserRepository {
    pool: DbPool,
}

impl PgUserRepository {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    #[tracing::instrument(level = "debug", skip(self, password_hash), err)]
    async fn insert(&self, username: &str, password_hash: &str, created_at: OffsetDateTime) -> Result<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            INSERT INTO users (id, username, password_hash, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (username) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(password_hash)
        .bind(created_at)
        .fetch_optional(&self.pool)
        .await?;

        record.map(Into::into).ok_or(AppError::DuplicateIdentity)
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self, token), err)]
    async fn find_by_valid_reset_token(&self, token: &str, now: OffsetDateTime) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE reset_token = $1 AND reset_token_expires_at > $2"
        ))
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Into::into))
    }

    #[tracing::instrument(level = "debug", skip(self, password_hash), err)]
    async fn update_password_hash(&self, username: &str, password_hash: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE username = $1")
            .bind(username)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::UserNotFound);
        }
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, reset), err)]
    async fn set_reset_token(&self, username: &str, reset: &PendingReset) -> Result<()> {
        let result =
            sqlx::query("UPDATE users SET reset_token = $2, reset_token_expires_at = $3 WHERE username = $1")
                .bind(username)
                .bind(reset.token())
                .bind(reset.expires_at())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::UserNotFound);
        }
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn clear_reset_token(&self, username: &str) -> Result<()> {
        let result =
            sqlx::query("UPDATE users SET reset_token = NULL, reset_token_expires_at = NULL WHERE username = $1")
                .bind(username)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::UserNotFound);
        }
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, token, password_hash), err)]
    async fn complete_reset(&self, token: &str, password_hash: &str, now: OffsetDateTime) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            r#"
            UPDATE users
            SET password_hash = $2, reset_token = NULL, reset_token_expires_at = NULL
            WHERE reset_token = $1 AND reset_token_expires_at > $3
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(token)
        .bind(password_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Into::into))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
