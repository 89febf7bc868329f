use crate::domain::entities::{ConversationSlaState, ConversationStatus};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::conversation_repository::ConversationRepository;
use crate::infrastructure::persistence::{
    format_optional_timestamp, format_timestamp, optional_column, optional_timestamp, Database,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

impl Database {
    // ========================================
    // Conversation Operations
    // ========================================
    //
    // Conversations are owned by the helpdesk; these writers exist so the
    // engine can be driven end to end.

    pub async fn create_conversation(&self, conversation: &ConversationSlaState) -> DomainResult<()> {
        let now = format_timestamp(Utc::now());
        sqlx::query(
            "INSERT INTO conversations (id, reference_number, subject, status, assigned_user_id, assigned_team_id,
                 first_response_at, resolved_at, next_sla_deadline_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&conversation.id)
        .bind(conversation.reference_number)
        .bind(&conversation.subject)
        .bind(conversation.status.to_string())
        .bind(&conversation.assigned_user_id)
        .bind(&conversation.assigned_team_id)
        .bind(format_optional_timestamp(conversation.first_response_at))
        .bind(format_optional_timestamp(conversation.resolved_at))
        .bind(format_optional_timestamp(conversation.next_sla_deadline_at))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record the first agent reply. Later replies keep the original time.
    pub async fn record_first_response(
        &self,
        conversation_id: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.touch_conversation(
            "UPDATE conversations SET first_response_at = COALESCE(first_response_at, ?), updated_at = ?
             WHERE id = ?",
            conversation_id,
            Some(at),
        )
        .await
    }

    pub async fn resolve_conversation(
        &self,
        conversation_id: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        self.touch_conversation(
            "UPDATE conversations SET status = 'resolved', resolved_at = ?, updated_at = ?
             WHERE id = ?",
            conversation_id,
            Some(at),
        )
        .await
    }

    pub async fn set_conversation_status(
        &self,
        conversation_id: &str,
        status: ConversationStatus,
    ) -> DomainResult<()> {
        let result = sqlx::query("UPDATE conversations SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(format_timestamp(Utc::now()))
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!(
                "Conversation not found: {}",
                conversation_id
            )));
        }
        Ok(())
    }

    pub async fn assign_conversation_user(
        &self,
        conversation_id: &str,
        agent_id: Option<&str>,
    ) -> DomainResult<()> {
        let result =
            sqlx::query("UPDATE conversations SET assigned_user_id = ?, updated_at = ? WHERE id = ?")
                .bind(agent_id)
                .bind(format_timestamp(Utc::now()))
                .bind(conversation_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!(
                "Conversation not found: {}",
                conversation_id
            )));
        }
        Ok(())
    }

    async fn touch_conversation(
        &self,
        statement: &str,
        conversation_id: &str,
        at: Option<DateTime<Utc>>,
    ) -> DomainResult<()> {
        let result = sqlx::query(statement)
            .bind(format_optional_timestamp(at))
            .bind(format_timestamp(Utc::now()))
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!(
                "Conversation not found: {}",
                conversation_id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationRepository for Database {
    async fn get_conversation_sla_state(
        &self,
        conversation_id: &str,
    ) -> DomainResult<Option<ConversationSlaState>> {
        let row = sqlx::query(
            "SELECT id, reference_number, subject, status, assigned_user_id, assigned_team_id,
                    first_response_at, resolved_at, next_sla_deadline_at
             FROM conversations WHERE id = ?",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status: String = row.try_get("status")?;
        Ok(Some(ConversationSlaState {
            id: row.try_get("id")?,
            reference_number: row.try_get("reference_number")?,
            subject: optional_column(&row, "subject"),
            status: ConversationStatus::from(status),
            assigned_user_id: optional_column(&row, "assigned_user_id"),
            assigned_team_id: optional_column(&row, "assigned_team_id"),
            first_response_at: optional_timestamp(&row, "first_response_at")?,
            resolved_at: optional_timestamp(&row, "resolved_at")?,
            next_sla_deadline_at: optional_timestamp(&row, "next_sla_deadline_at")?,
        }))
    }

    async fn update_next_sla_deadline(
        &self,
        conversation_id: &str,
        deadline_at: Option<DateTime<Utc>>,
    ) -> DomainResult<()> {
        sqlx::query("UPDATE conversations SET next_sla_deadline_at = ?, updated_at = ? WHERE id = ?")
            .bind(format_optional_timestamp(deadline_at))
            .bind(format_timestamp(Utc::now()))
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
