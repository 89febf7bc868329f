use crate::domain::errors::DomainResult;
use async_trait::async_trait;

pub const EMAIL_PROVIDER: &str = "email";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub recipient_emails: Vec<String>,
    pub subject: String,
    pub content: String,
    pub provider: String,
}

/// Outbound notification transport. Delivery is attempted once; the engine
/// only logs failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: NotificationMessage) -> DomainResult<()>;

    /// Get the provider name for logging/debugging
    fn provider_name(&self) -> &'static str;
}
