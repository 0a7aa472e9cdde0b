use crate::domain::password_reset::PendingReset;
use crate::domain::user::User;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(sqlx::FromRow)]
pub(crate) struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub reset_token: Option<String>,
    pub reset_token_expires_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        // The table's CHECK constraint keeps these two columns null together.
        let reset = record.reset_token.zip(record.reset_token_expires_at).map(|(t, e)| PendingReset::new(t, e));
        Self {
            id: record.id,
            username: record.username,
            password_hash: record.password_hash,
            reset,
            created_at: record.created_at,
        }
    }
}
