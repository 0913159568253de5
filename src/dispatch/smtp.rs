//! SMTP delivery channel.

use anyhow::{Context, Result};
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::{SmtpConfig, SmtpTls};
use crate::error::DeliveryError;

use super::{DeliveryChannel, Notification};

/// Sends each notification as one multipart mail with the captures attached.
pub struct SmtpChannel {
    mailer: SmtpTransport,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpChannel {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let username = config
            .username
            .as_ref()
            .context("smtp username is required (SNAPWATCH_SMTP_USERNAME)")?;
        let password = config
            .password
            .as_ref()
            .context("smtp password is required (SNAPWATCH_SMTP_PASSWORD)")?;
        let from = config
            .from
            .as_deref()
            .unwrap_or(username.as_str());
        let from: Mailbox = from
            .parse()
            .context("smtp sender is not a valid email address")?;
        // Without an explicit recipient the sender mails itself.
        let to: Mailbox = match config.to.as_deref() {
            Some(to) => to
                .parse()
                .context("smtp recipient is not a valid email address")?,
            None => from.clone(),
        };

        let creds = Credentials::new(username.clone(), password.clone());
        let mailer = match config.tls {
            SmtpTls::Wrapper => SmtpTransport::relay(&config.host)
                .context("failed to create SMTP TLS transport")?
                .port(config.port)
                .credentials(creds)
                .build(),
            SmtpTls::StartTls => SmtpTransport::starttls_relay(&config.host)
                .context("failed to create SMTP STARTTLS transport")?
                .port(config.port)
                .credentials(creds)
                .build(),
            SmtpTls::None => SmtpTransport::builder_dangerous(&config.host)
                .port(config.port)
                .credentials(creds)
                .build(),
        };

        log::info!(
            "SMTP channel ready: {}:{} ({}) to {}",
            config.host,
            config.port,
            config.tls,
            to
        );
        Ok(Self { mailer, from, to })
    }

    fn build_message(&self, note: &Notification) -> Result<Message, DeliveryError> {
        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(note.body.clone()));
        for attachment in &note.attachments {
            let content_type = ContentType::parse(attachment.content_type)
                .map_err(|e| DeliveryError::Message(e.to_string()))?;
            parts = parts.singlepart(
                lettre::message::Attachment::new(attachment.filename.clone())
                    .body(attachment.data.clone(), content_type),
            );
        }
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(note.subject.clone())
            .multipart(parts)
            .map_err(|e| DeliveryError::Message(e.to_string()))
    }
}

impl DeliveryChannel for SmtpChannel {
    fn name(&self) -> &'static str {
        "smtp"
    }

    fn deliver(&mut self, note: &Notification) -> Result<(), DeliveryError> {
        let message = self.build_message(note)?;
        self.mailer
            .send(&message)
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        Ok(())
    }
}
