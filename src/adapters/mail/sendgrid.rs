use crate::config::MailConfig;
use crate::services::mailer::{MailError, Mailer, OutgoingEmail};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: [Address<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    personalizations: [Personalization<'a>; 1],
    from: Address<'a>,
    subject: &'a str,
    content: [Content<'a>; 1],
}

/// Delivers mail through the SendGrid v3 `mail/send` endpoint.
#[derive(Debug)]
pub struct SendGridMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    from_address: String,
}

impl SendGridMailer {
    /// # Errors
    /// Returns `MailError::Transport` if the HTTP client cannot be built.
    pub fn new(config: &MailConfig, api_key: SecretString) -> Result<Self, MailError> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/v3/mail/send", config.api_base.trim_end_matches('/')),
            api_key,
            from_address: config.from_address.clone(),
        })
    }

    fn request_body<'a>(&'a self, email: &'a OutgoingEmail) -> SendRequest<'a> {
        SendRequest {
            personalizations: [Personalization { to: [Address { email: &email.to }] }],
            from: Address { email: &self.from_address },
            subject: &email.subject,
            content: [Content { kind: "text/plain", value: &email.body }],
        }
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    #[tracing::instrument(skip(self, email), fields(mail.to = %email.to), err(level = "warn"))]
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&self.request_body(email))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Rejected { status: status.as_u16() });
        }

        tracing::debug!(status = %status.as_u16(), "Mail accepted by provider");
        Ok(())
    }
}
