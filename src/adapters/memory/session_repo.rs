use crate::error::Result;
use crate::services::ports::SessionRepository;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct SessionEntry {
    user_id: Uuid,
    expires_at: OffsetDateTime,
}

#[derive(Clone, Debug, Default)]
pub struct InMemorySessionRepository {
    sessions: Arc<DashMap<String, SessionEntry>>,
}

impl InMemorySessionRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn create(&self, token_hash: &str, user_id: Uuid, expires_at: OffsetDateTime) -> Result<()> {
        self.sessions.insert(token_hash.to_string(), SessionEntry { user_id, expires_at });
        Ok(())
    }

    async fn find_user(&self, token_hash: &str, now: OffsetDateTime) -> Result<Option<Uuid>> {
        Ok(self.sessions.get(token_hash).filter(|s| s.expires_at > now).map(|s| s.user_id))
    }

    async fn delete_owned(&self, token_hash: &str, user_id: Uuid) -> Result<()> {
        self.sessions.remove_if(token_hash, |_, s| s.user_id == user_id);
        Ok(())
    }

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64> {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.expires_at > now);
        Ok(u64::try_from(before.saturating_sub(self.sessions.len())).unwrap_or(u64::MAX))
    }
}
