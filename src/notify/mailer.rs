use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::{info, instrument};

use crate::config::SmtpConfig;

/// A fully composed outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address {0}")]
    InvalidAddress(String),
    #[error("failed to build email: {0}")]
    Build(String),
    #[error("smtp transport error: {0}")]
    Transport(String),
}

/// Outbound email transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError>;
}

/// SMTP delivery through a STARTTLS relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| MailError::InvalidAddress(format!("From '{}': {}", config.from, e)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        info!(host = %config.host, port = config.port, "created SMTP mailer");
        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build_message(&self, email: &OutgoingEmail) -> Result<Message, MailError> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| MailError::InvalidAddress(format!("To '{}': {}", email.to, e)))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject);

        match &email.html_body {
            Some(html) => builder
                .multipart(
                    MultiPart::alternative()
                        .singlepart(SinglePart::plain(email.text_body.clone()))
                        .singlepart(SinglePart::html(html.clone())),
                )
                .map_err(|e| MailError::Build(e.to_string())),
            None => builder
                .body(email.text_body.clone())
                .map_err(|e| MailError::Build(e.to_string())),
        }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip(self, email), fields(to = %email.to, subject = %email.subject))]
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let message = self.build_message(email)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        info!("email sent");
        Ok(())
    }
}
