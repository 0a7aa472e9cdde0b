use crate::domain::password_reset::{PendingReset, RESET_EMAIL_SUBJECT, reset_email_body, reset_link};
use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::services::credential_store::CredentialStore;
use crate::services::mailer::{Mailer, OutgoingEmail};
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use time::Duration;

#[derive(Clone, Debug)]
struct Metrics {
    issued_total: Counter<u64>,
    completed_total: Counter<u64>,
    deliveries_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("latchkey-server");
        Self {
            issued_total: meter
                .u64_counter("latchkey_password_resets_issued_total")
                .with_description("Total number of reset tokens issued")
                .build(),
            completed_total: meter
                .u64_counter("latchkey_password_resets_completed_total")
                .with_description("Total number of passwords changed through a reset token")
                .build(),
            deliveries_total: meter
                .u64_counter("latchkey_mail_deliveries_total")
                .with_description("Reset email delivery attempts by result")
                .build(),
        }
    }
}

/// Drives the forgot-password cycle: issue, validate, consume.
#[derive(Clone, Debug)]
pub struct ResetService {
    store: CredentialStore,
    mailer: Arc<dyn Mailer>,
    token_ttl: Duration,
    metrics: Metrics,
}

impl ResetService {
    #[must_use]
    pub fn new(store: CredentialStore, mailer: Arc<dyn Mailer>, token_ttl: Duration) -> Self {
        Self { store, mailer, token_ttl, metrics: Metrics::new() }
    }

    /// Issues a fresh token for `username`, replacing any outstanding one, and
    /// mails `<base_url>/reset/<token>` to the username.
    ///
    /// The token is committed before delivery is attempted; if delivery fails
    /// it stays pending and the caller sees `DeliveryFailure`.
    ///
    /// # Errors
    /// `AppError::UserNotFound` for unknown usernames (no state change),
    /// `AppError::DeliveryFailure` if the mailer fails, `AppError::PersistenceFailure` on store errors.
    #[tracing::instrument(
        skip(self, username, base_url),
        fields(user_id = tracing::field::Empty),
        err(level = "warn")
    )]
    pub async fn issue(&self, username: &str, base_url: &str) -> Result<PendingReset> {
        let Some(user) = self.store.find_by_username(username).await? else {
            tracing::warn!("Reset requested for unknown user");
            return Err(AppError::UserNotFound);
        };

        tracing::Span::current().record("user_id", tracing::field::display(user.id));

        let reset = PendingReset::generate(self.store.now() + self.token_ttl);
        self.store.set_reset_token(&user, &reset).await?;
        self.metrics.issued_total.add(1, &[]);

        let email = OutgoingEmail {
            to: user.username.clone(),
            subject: RESET_EMAIL_SUBJECT.to_string(),
            body: reset_email_body(&reset_link(base_url, reset.token())),
        };

        if let Err(e) = self.mailer.send(&email).await {
            self.metrics.deliveries_total.add(1, &[KeyValue::new("result", "error")]);
            return Err(AppError::DeliveryFailure(e.to_string()));
        }
        self.metrics.deliveries_total.add(1, &[KeyValue::new("result", "ok")]);

        tracing::info!("Password reset email sent");
        Ok(reset)
    }

    /// Read-only check that `token` is pending and unexpired.
    ///
    /// # Errors
    /// `AppError::InvalidOrExpiredToken` whether the token is unknown or expired.
    #[tracing::instrument(skip(self, token), err(level = "debug"))]
    pub async fn validate(&self, token: &str) -> Result<User> {
        self.store.find_by_valid_reset_token(token).await?.ok_or(AppError::InvalidOrExpiredToken)
    }

    /// Redeems `token` for a new password. A mismatched confirmation is
    /// rejected before the token is looked at, so the link stays usable.
    ///
    /// # Errors
    /// `AppError::PasswordMismatch`, `AppError::InvalidOrExpiredToken`, or store errors.
    #[tracing::instrument(
        skip(self, token, password, confirmation),
        fields(user_id = tracing::field::Empty),
        err(level = "warn")
    )]
    pub async fn consume(&self, token: &str, password: &str, confirmation: &str) -> Result<User> {
        if password != confirmation {
            return Err(AppError::PasswordMismatch);
        }

        self.validate(token).await?;

        let user = self.store.complete_reset(token, password).await?.ok_or(AppError::InvalidOrExpiredToken)?;

        tracing::Span::current().record("user_id", tracing::field::display(user.id));
        tracing::info!("Password reset completed");
        self.metrics.completed_total.add(1, &[]);

        Ok(user)
    }
}
