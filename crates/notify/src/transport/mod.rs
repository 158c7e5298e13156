//! Email transport.
//!
//! [`EmailTransport`] assembles the wire message and hands it to an
//! [`OutboundMailer`]. It never touches alert state.

mod smtp;

pub use smtp::{SmtpConfig, SmtpMailer, DEFAULT_SMTP_PORT};

use async_trait::async_trait;
use lettre::message::header::{ContentType, MIME_VERSION_1_0};
use lettre::message::Mailbox;
use lettre::Message;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

#[cfg(test)]
use mockall::automock;

use crate::digest::EmailDigest;
use crate::error::TransportError;

/// Default sender address.
pub const DEFAULT_FROM: &str = "noreply@zue.dev";

/// Default operator address.
pub const DEFAULT_TO: &str = "zuedev@gmail.com";

/// Outbound mail capability that accepts fully built messages.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OutboundMailer: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    async fn deliver(&self, message: Message) -> Result<(), TransportError>;
}

/// Builds digest emails and hands them off.
#[derive(Clone)]
pub struct EmailTransport {
    mailer: Arc<dyn OutboundMailer>,
}

impl EmailTransport {
    #[must_use]
    pub fn new(mailer: Arc<dyn OutboundMailer>) -> Self {
        Self { mailer }
    }

    /// Send `digest` from `from` to `to`.
    #[instrument(skip(self, digest), fields(mailer = self.mailer.name(), subject = %digest.subject))]
    pub async fn send(
        &self,
        from: &str,
        to: &str,
        digest: &EmailDigest,
    ) -> Result<(), TransportError> {
        let message = build_message(from, to, digest)?;
        self.mailer.deliver(message).await?;
        debug!("Handed message to mailer");
        Ok(())
    }
}

/// Assemble an HTML message with a `Message-ID` scoped to the sender's domain.
pub fn build_message(
    from: &str,
    to: &str,
    digest: &EmailDigest,
) -> Result<Message, TransportError> {
    let from_mailbox = parse_mailbox(from)?;
    let to_mailbox = parse_mailbox(to)?;

    let domain = from_mailbox.email.domain().to_string();
    Message::builder()
        .from(from_mailbox)
        .to(to_mailbox)
        .subject(digest.subject.as_str())
        .message_id(Some(message_id(&domain)))
        .header(MIME_VERSION_1_0)
        .header(ContentType::TEXT_HTML)
        .body(digest.body_html.clone())
        .map_err(|e| TransportError::Build(e.to_string()))
}

/// A fresh `<uuid@domain>` identifier.
#[must_use]
pub fn message_id(domain: &str) -> String {
    format!("<{}@{domain}>", Uuid::new_v4())
}

fn parse_mailbox(address: &str) -> Result<Mailbox, TransportError> {
    address
        .parse()
        .map_err(|e: lettre::address::AddressError| TransportError::Address {
            address: address.to_string(),
            reason: e.to_string(),
        })
}
