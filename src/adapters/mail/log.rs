use crate::domain::password_reset::redact_reset_links;
use crate::services::mailer::{MailError, Mailer, OutgoingEmail};
use async_trait::async_trait;

/// Local development mailer: logs the message instead of sending it.
/// Reset links in the body are redacted.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        tracing::info!(to = %email.to, subject = %email.subject, "STUB: mail delivery");
        tracing::debug!(to = %email.to, body = %redact_reset_links(&email.body), "STUB: mail body");
        Ok(())
    }
}
