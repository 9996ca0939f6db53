use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    clients::DeliveryAdapter,
    config::Config,
    models::{error::DeliveryError, notification::NotificationType, template::RenderedContent},
    utils::strip_html,
};

pub struct SmtpAdapter {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpAdapter {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let builder = if config.smtp_starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        }
        .map_err(|e| anyhow!("Invalid SMTP relay {}: {}", config.smtp_host, e))?;

        let transport = builder
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ))
            .build();

        let from = format!("{} <{}>", config.smtp_from_name, config.smtp_from_address())
            .parse::<Mailbox>()
            .map_err(|e| anyhow!("Invalid sender address: {}", e))?;

        info!(
            host = %config.smtp_host,
            port = config.smtp_port,
            starttls = config.smtp_starttls,
            "SMTP adapter initialized"
        );

        Ok(Self { transport, from })
    }

    /// Builds a multipart/alternative message: the tag-stripped text part first, then
    /// the HTML body.
    pub fn build_message(
        &self,
        recipient: &str,
        content: &RenderedContent,
    ) -> Result<Message, DeliveryError> {
        let to = recipient
            .parse::<Mailbox>()
            .map_err(|e| DeliveryError::InvalidRecipient(format!("{}: {}", recipient, e)))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(content.title())
            .multipart(MultiPart::alternative_plain_html(
                strip_html(&content.body),
                content.body.clone(),
            ))
            .map_err(|e| DeliveryError::Rejected(format!("failed to build email: {}", e)))
    }
}

#[async_trait]
impl DeliveryAdapter for SmtpAdapter {
    fn channel(&self) -> NotificationType {
        NotificationType::Email
    }

    async fn deliver(
        &self,
        recipient: &str,
        content: &RenderedContent,
        notification_id: Uuid,
    ) -> Result<(), DeliveryError> {
        let message = self.build_message(recipient, content)?;

        debug!(%notification_id, recipient, "Submitting email to SMTP relay");

        match self.transport.send(message).await {
            Ok(response) if response.is_positive() => {
                info!(%notification_id, "Email accepted by SMTP relay");
                Ok(())
            }
            Ok(response) => Err(DeliveryError::Rejected(format!(
                "SMTP relay answered {}",
                response.code()
            ))),
            Err(e) => {
                warn!(%notification_id, error = %e, "SMTP submission failed");
                if e.is_permanent() {
                    Err(DeliveryError::Rejected(e.to_string()))
                } else {
                    Err(DeliveryError::Unreachable(e.to_string()))
                }
            }
        }
    }
}
