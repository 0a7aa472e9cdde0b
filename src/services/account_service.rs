use crate::domain::auth::OpaqueToken;
use crate::domain::session::AuthSession;
use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::services::credential_store::CredentialStore;
use crate::services::ports::SessionRepository;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use time::Duration;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct AccountMetrics {
    users_registered_total: Counter<u64>,
    logins_total: Counter<u64>,
    logouts_total: Counter<u64>,
}

impl AccountMetrics {
    fn new() -> Self {
        let meter = global::meter("latchkey-server");
        Self {
            users_registered_total: meter
                .u64_counter("latchkey_users_registered_total")
                .with_description("Total number of successful user registrations")
                .build(),
            logins_total: meter
                .u64_counter("latchkey_logins_total")
                .with_description("Login attempts by result")
                .build(),
            logouts_total: meter
                .u64_counter("latchkey_logouts_total")
                .with_description("Total number of successful logout attempts")
                .build(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AccountService {
    store: CredentialStore,
    sessions: Arc<dyn SessionRepository>,
    session_ttl: Duration,
    metrics: AccountMetrics,
}

impl AccountService {
    #[must_use]
    pub fn new(store: CredentialStore, sessions: Arc<dyn SessionRepository>, session_ttl: Duration) -> Self {
        Self { store, sessions, session_ttl, metrics: AccountMetrics::new() }
    }

    /// # Errors
    /// `AppError::DuplicateIdentity` if the username is taken.
    #[tracing::instrument(skip(self, username, password), fields(user_id = tracing::field::Empty), err(level = "warn"))]
    pub async fn register(&self, username: &str, password: &str) -> Result<User> {
        let user = self.store.create_user(username, password).await?;

        tracing::Span::current().record("user_id", tracing::field::display(user.id));
        tracing::info!("User registered successfully");
        self.metrics.users_registered_total.add(1, &[]);

        Ok(user)
    }

    /// Checks a username/password pair. `None` covers both an unknown user
    /// and a wrong password, and both paths perform one Argon2 verification.
    ///
    /// # Errors
    /// Only store or hashing failures; a bad credential is `Ok(None)`.
    pub async fn verify_credentials(&self, username: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.store.find_by_username(username).await? else {
            self.store.burn_verification(password).await?;
            tracing::warn!("Login failed: user not found");
            return Ok(None);
        };

        if self.store.verify_password(&user, password).await? {
            Ok(Some(user))
        } else {
            tracing::warn!(user_id = %user.id, "Login failed: invalid password");
            Ok(None)
        }
    }

    /// # Errors
    /// `AppError::AuthError` for any bad credential.
    #[tracing::instrument(skip(self, username, password), fields(user_id = tracing::field::Empty), err(level = "warn"))]
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthSession> {
        let Some(user) = self.verify_credentials(username, password).await? else {
            self.metrics.logins_total.add(1, &[KeyValue::new("result", "rejected")]);
            return Err(AppError::AuthError);
        };

        tracing::Span::current().record("user_id", tracing::field::display(user.id));

        let session = self.create_session(user.id).await?;
        tracing::info!("User logged in successfully");
        self.metrics.logins_total.add(1, &[KeyValue::new("result", "ok")]);

        Ok(session)
    }

    /// Resolves a bearer session handle to its user.
    ///
    /// # Errors
    /// `AppError::AuthError` if the session is unknown or expired.
    pub async fn authenticate(&self, session_token: &str) -> Result<Uuid> {
        let hash = OpaqueToken::hash(session_token);
        self.sessions.find_user(&hash, self.store.now()).await?.ok_or(AppError::AuthError)
    }

    /// # Errors
    /// Returns `AppError::PersistenceFailure` if the deletion fails.
    #[tracing::instrument(err, skip(self, session_token), fields(user_id = %user_id))]
    pub async fn logout(&self, user_id: Uuid, session_token: &str) -> Result<()> {
        let hash = OpaqueToken::hash(session_token);
        self.sessions.delete_owned(&hash, user_id).await?;
        tracing::info!("User logged out");
        self.metrics.logouts_total.add(1, &[]);
        Ok(())
    }

    async fn create_session(&self, user_id: Uuid) -> Result<AuthSession> {
        let token = OpaqueToken::generate();
        let expires_at = self.store.now() + self.session_ttl;
        self.sessions.create(&OpaqueToken::hash(&token), user_id, expires_at).await?;
        Ok(AuthSession { token, expires_at })
    }
}
