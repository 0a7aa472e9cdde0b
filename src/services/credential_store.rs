use crate::domain::auth::{Password, validate_username};
use crate::domain::clock::Clock;
use crate::domain::password_reset::PendingReset;
use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::services::ports::UserRepository;
use std::sync::Arc;
use time::OffsetDateTime;

/// Persistence-and-policy layer for user identities and password hashes.
///
/// Plaintext passwords enter here and leave only as Argon2 hashes. Hashing
/// runs on the blocking pool.
#[derive(Clone, Debug)]
pub struct CredentialStore {
    users: Arc<dyn UserRepository>,
    clock: Arc<dyn Clock>,
}

impl CredentialStore {
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { users, clock }
    }

    #[must_use]
    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    /// # Errors
    /// `AppError::DuplicateIdentity` if the username exists, `AppError::BadRequest`
    /// on malformed input.
    #[tracing::instrument(skip(self, username, password), err(level = "warn"))]
    pub async fn create_user(&self, username: &str, password: &str) -> Result<User> {
        validate_username(username)?;
        Password::validate(password)?;

        let password_hash = self.hash_password(password).await?;
        self.users.insert(username, &password_hash, self.clock.now()).await
    }

    /// # Errors
    /// Returns `AppError::PersistenceFailure` if the lookup fails.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        self.users.find_by_username(username).await
    }

    /// Wrong and expired tokens both yield `None`.
    ///
    /// # Errors
    /// Returns `AppError::PersistenceFailure` if the lookup fails.
    pub async fn find_by_valid_reset_token(&self, token: &str) -> Result<Option<User>> {
        self.users.find_by_valid_reset_token(token, self.clock.now()).await
    }

    /// # Errors
    /// Returns `AppError::Internal` if the stored hash is unreadable.
    #[tracing::instrument(skip(self, user, password), fields(user_id = %user.id), err)]
    pub async fn verify_password(&self, user: &User, password: &str) -> Result<bool> {
        let password = password.to_string();
        let password_hash = user.password_hash.clone();
        tokio::task::spawn_blocking(move || Password::verify(&password, &password_hash))
            .await
            .map_err(|_| AppError::Internal)?
    }

    /// Same cost as `verify_password`, for callers that have no user to check against.
    ///
    /// # Errors
    /// Returns `AppError::Internal` if the blocking task fails.
    pub async fn burn_verification(&self, password: &str) -> Result<()> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || Password::verify_dummy(&password)).await.map_err(|_| AppError::Internal)
    }

    /// Replaces the password hash. Leaves any pending reset token untouched.
    ///
    /// # Errors
    /// `AppError::UserNotFound` if the user vanished, `AppError::BadRequest` on malformed input.
    #[tracing::instrument(skip(self, user, password), fields(user_id = %user.id), err(level = "warn"))]
    pub async fn set_password(&self, user: &User, password: &str) -> Result<()> {
        Password::validate(password)?;
        let password_hash = self.hash_password(password).await?;
        self.users.update_password_hash(&user.username, &password_hash).await
    }

    /// # Errors
    /// `AppError::UserNotFound` if the user vanished.
    #[tracing::instrument(skip(self, user, reset), fields(user_id = %user.id), err(level = "warn"))]
    pub async fn set_reset_token(&self, user: &User, reset: &PendingReset) -> Result<()> {
        self.users.set_reset_token(&user.username, reset).await
    }

    /// # Errors
    /// `AppError::UserNotFound` if the user vanished.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id), err(level = "warn"))]
    pub async fn clear_reset_token(&self, user: &User) -> Result<()> {
        self.users.clear_reset_token(&user.username).await
    }

    /// Sets the new password and clears the token in one compare-and-set.
    /// Returns `None` when the token is wrong or expired at the time of the write.
    ///
    /// # Errors
    /// `AppError::BadRequest` on malformed input, `AppError::PersistenceFailure` on store errors.
    #[tracing::instrument(skip(self, token, password), err(level = "warn"))]
    pub async fn complete_reset(&self, token: &str, password: &str) -> Result<Option<User>> {
        Password::validate(password)?;
        let password_hash = self.hash_password(password).await?;
        self.users.complete_reset(token, &password_hash, self.clock.now()).await
    }

    async fn hash_password(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || Password::hash(&password)).await.map_err(|_| AppError::Internal)?
    }
}
