//! Persistence ports consumed by the services. Adapters live under
//! `crate::adapters` (Postgres and in-memory).

use crate::domain::password_reset::PendingReset;
use crate::domain::user::User;
use crate::error::Result;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Durable user records keyed by username.
///
/// Every mutating call names the full set of fields it changes and is applied
/// to a single record atomically, so two concurrent writers never interleave
/// a read-modify-write.
#[async_trait]
pub trait UserRepository: Send + Sync + std::fmt::Debug {
    /// Inserts a new user with no pending reset.
    ///
    /// # Errors
    /// Returns `AppError::DuplicateIdentity` if the username is taken.
    async fn insert(&self, username: &str, password_hash: &str, created_at: OffsetDateTime) -> Result<User>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Matches only a stored token equal to `token` whose expiry is strictly after `now`.
    async fn find_by_valid_reset_token(&self, token: &str, now: OffsetDateTime) -> Result<Option<User>>;

    /// # Errors
    /// Returns `AppError::UserNotFound` if no such user exists.
    async fn update_password_hash(&self, username: &str, password_hash: &str) -> Result<()>;

    /// Overwrites any previously stored token (last write wins).
    ///
    /// # Errors
    /// Returns `AppError::UserNotFound` if no such user exists.
    async fn set_reset_token(&self, username: &str, reset: &PendingReset) -> Result<()>;

    /// # Errors
    /// Returns `AppError::UserNotFound` if no such user exists.
    async fn clear_reset_token(&self, username: &str) -> Result<()>;

    /// Compare-and-set: if a user holds `token` unexpired at `now`, replace the
    /// password hash and clear both token fields in one step.
    /// Returns the updated user, or `None` if nothing matched.
    async fn complete_reset(&self, token: &str, password_hash: &str, now: OffsetDateTime) -> Result<Option<User>>;

    /// Cheap connectivity probe for readiness checks.
    async fn ping(&self) -> Result<()>;
}

/// Server-side login sessions, addressed by the SHA-256 of the opaque handle.
#[async_trait]
pub trait SessionRepository: Send + Sync + std::fmt::Debug {
    async fn create(&self, token_hash: &str, user_id: Uuid, expires_at: OffsetDateTime) -> Result<()>;

    /// Returns the owning user if the session exists and `expires_at > now`.
    async fn find_user(&self, token_hash: &str, now: OffsetDateTime) -> Result<Option<Uuid>>;

    async fn delete_owned(&self, token_hash: &str, user_id: Uuid) -> Result<()>;

    async fn delete_expired(&self, now: OffsetDateTime) -> Result<u64>;
}
