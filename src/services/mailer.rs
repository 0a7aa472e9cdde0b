use async_trait::async_trait;
use thiserror::Error;

/// A plain-text message addressed to a single recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Mail provider rejected the message (status {status})")]
    Rejected { status: u16 },
    #[error("Mail transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait Mailer: Send + Sync + std::fmt::Debug {
    /// Attempts delivery exactly once.
    ///
    /// # Errors
    /// Returns `MailError` if the provider could not be reached or refused the message.
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}
