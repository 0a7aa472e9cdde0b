use crate::domain::password_reset::PendingReset;
use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::services::ports::UserRepository;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct InMemoryUserRepository {
    users: Arc<DashMap<String, User>>,
}

impl InMemoryUserRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, username: &str, apply: F) -> Result<()>
    where
        F: FnOnce(&mut User),
    {
        let mut user = self.users.get_mut(username).ok_or(AppError::UserNotFound)?;
        apply(&mut user);
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn insert(&self, username: &str, password_hash: &str, created_at: OffsetDateTime) -> Result<User> {
        match self.users.entry(username.to_string()) {
            Entry::Occupied(_) => Err(AppError::DuplicateIdentity),
            Entry::Vacant(slot) => {
                let user = User {
                    id: Uuid::new_v4(),
                    username: username.to_string(),
                    password_hash: password_hash.to_string(),
                    reset: None,
                    created_at,
                };
                slot.insert(user.clone());
                Ok(user)
            }
        }
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.users.get(username).map(|u| u.value().clone()))
    }

    async fn find_by_valid_reset_token(&self, token: &str, now: OffsetDateTime) -> Result<Option<User>> {
        Ok(self.users.iter().find(|u| u.has_valid_reset_token(token, now)).map(|u| u.value().clone()))
    }

    async fn update_password_hash(&self, username: &str, password_hash: &str) -> Result<()> {
        self.update(username, |user| user.password_hash = password_hash.to_string())
    }

    async fn set_reset_token(&self, username: &str, reset: &PendingReset) -> Result<()> {
        self.update(username, |user| user.reset = Some(reset.clone()))
    }

    async fn clear_reset_token(&self, username: &str) -> Result<()> {
        self.update(username, |user| user.reset = None)
    }

    async fn complete_reset(&self, token: &str, password_hash: &str, now: OffsetDateTime) -> Result<Option<User>> {
        // The shard write lock is held across the check and the update.
        for mut entry in self.users.iter_mut() {
            if entry.has_valid_reset_token(token, now) {
                let user = entry.value_mut();
                user.password_hash = password_hash.to_string();
                user.reset = None;
                return Ok(Some(user.clone()));
            }
        }
        Ok(None)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
