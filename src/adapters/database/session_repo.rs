use crate::adapters::database::DbPool;
use crate::error::Result;
use crate::services::ports::SessionRepository;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct PgSessionRepository {
    pool: DbPool,
}

impl PgSessionRepository {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    /// Note: We store the HASH, not the raw token.
    #[tracing::instrument(level = "debug", skip(self, token_hash), err)]
    async fn create(&self, token_hash: &str, user_id: Uuid, expires_at: OffsetDateTime) -> Result<()> {
        sqlx::query("INSERT INTO sessions (token_hash, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token_hash)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, token_hash), err)]
    async fn find_user(&self, token_hash: &str, now: OffsetDateTime) -> Result<Option<Uuid>> {
        let user_id =
            sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM sessions WHERE token_hash = $1 AND expires_at > $2")
                .bind(token_hash)
                .bind(now)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user_id)
    }

    #[tracing::instrument(level = "debug", skip(self, token_hash), err)]
    async fn delete_owned(&self, token_hash: &str, user_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1 AND user_id = $2")
            .bind(token_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self), err)]
    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1").bind(now).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
