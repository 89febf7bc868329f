use chrono::{DateTime, Utc};

use crate::domain::entities::ConversationSlaState;
use crate::domain::errors::DomainResult;

/// The few conversation fields the SLA engine reads and writes
#[async_trait::async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn get_conversation_sla_state(
        &self,
        conversation_id: &str,
    ) -> DomainResult<Option<ConversationSlaState>>;

    async fn update_next_sla_deadline(
        &self,
        conversation_id: &str,
        deadline_at: Option<DateTime<Utc>>,
    ) -> DomainResult<()>;
}
