//! SMTP mailer using STARTTLS.

use async_trait::async_trait;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use super::OutboundMailer;
use crate::error::TransportError;

/// Default SMTP port (STARTTLS).
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Connection settings for the outbound relay.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// [`OutboundMailer`] that relays through an authenticated SMTP server.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, TransportError> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| {
                TransportError::Delivery(format!("Failed to create SMTP transport: {e}"))
            })?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            transport,
            host: config.host.clone(),
        })
    }
}

#[async_trait]
impl OutboundMailer for SmtpMailer {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn deliver(&self, message: Message) -> Result<(), TransportError> {
        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| TransportError::Delivery(e.to_string()))?;

        info!(
            host = %self.host,
            code = %response.code(),
            "Email accepted by SMTP relay"
        );
        Ok(())
    }
}
