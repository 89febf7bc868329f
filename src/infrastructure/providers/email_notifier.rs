/// Outbound SLA notification transports.
///
/// `SmtpNotifier` sends HTML email through lettre's async SMTP transport.
/// `LogNotifier` only logs and is used when no SMTP host is configured.
use crate::config::SmtpConfig;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::notifier::{NotificationMessage, Notifier, EMAIL_PROVIDER};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message as LettreMessage, Tokio1Executor,
};

/// Email notifier backed by a single SMTP relay
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> DomainResult<Self> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| DomainError::Configuration(format!("Invalid SMTP from address: {}", e)))?;

        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host).map_err(|e| {
                DomainError::Configuration(format!("Failed to create SMTP transport: {}", e))
            })?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        builder = builder.port(config.port);

        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }

    fn build_email(&self, message: NotificationMessage) -> DomainResult<LettreMessage> {
        if message.recipient_emails.is_empty() {
            return Err(DomainError::ValidationError(
                "Notification has no recipients".to_string(),
            ));
        }

        let mut builder = LettreMessage::builder()
            .from(self.from.clone())
            .subject(message.subject)
            .header(ContentType::TEXT_HTML);

        for email in &message.recipient_emails {
            let to: Mailbox = email.parse().map_err(|e| {
                DomainError::ValidationError(format!("Invalid to address {}: {}", email, e))
            })?;
            builder = builder.to(to);
        }

        builder
            .body(message.content)
            .map_err(|e| DomainError::Internal(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, message: NotificationMessage) -> DomainResult<()> {
        let recipients = message.recipient_emails.join(", ");
        let email = self.build_email(message)?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| DomainError::Internal(format!("SMTP send error: {}", e)))?;

        tracing::info!("Email sent successfully to {}", recipients);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        EMAIL_PROVIDER
    }
}

/// Notifier that writes messages to the log instead of delivering them
#[derive(Clone, Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: NotificationMessage) -> DomainResult<()> {
        tracing::info!(
            provider = %message.provider,
            "[LogNotifier] Would send '{}' to {} ({} bytes)",
            message.subject,
            message.recipient_emails.join(", "),
            message.content.len()
        );
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "log"
    }
}
