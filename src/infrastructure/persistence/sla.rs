use crate::domain::entities::{
    AppliedSla, AppliedSlaStatus, ConversationStatus, NotificationRecipient,
    ScheduledSlaNotification, SlaEvent, SlaMetric, SlaPolicy,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::sla_repository::SlaRepository;
use crate::infrastructure::persistence::{
    format_optional_timestamp, format_timestamp, optional_column, optional_timestamp,
    parse_enum, parse_timestamp, Database,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{any::AnyRow, Row};

const POLICY_COLUMNS: &str = "id, name, description, first_response_time, resolution_time, \
     next_response_time, notifications, created_at, updated_at";

const APPLIED_SLA_SELECT: &str = "SELECT a.id, a.conversation_id, a.sla_policy_id, a.status, \
     a.first_response_deadline_at, a.resolution_deadline_at, \
     a.first_response_met_at, a.first_response_breached_at, \
     a.resolution_met_at, a.resolution_breached_at, a.created_at, a.updated_at, \
     c.first_response_at AS conversation_first_response_at, \
     c.resolved_at AS conversation_resolved_at, \
     c.status AS conversation_status \
     FROM applied_slas a LEFT JOIN conversations c ON c.id = a.conversation_id";

const EVENT_COLUMNS: &str = "id, applied_sla_id, sla_policy_id, metric, status, deadline_at, \
     met_at, breached_at, created_at, updated_at";

const NOTIFICATION_COLUMNS: &str = "id, applied_sla_id, sla_event_id, metric, notification_type, \
     recipients, send_at, processed, processed_at, created_at";

fn policy_from_row(row: &AnyRow) -> DomainResult<SlaPolicy> {
    let notifications: String = row.try_get("notifications")?;
    Ok(SlaPolicy {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: optional_column(row, "description"),
        first_response_time: row.try_get("first_response_time")?,
        resolution_time: row.try_get("resolution_time")?,
        next_response_time: row.try_get("next_response_time")?,
        notifications: serde_json::from_str(&notifications)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn applied_sla_from_row(row: &AnyRow) -> DomainResult<AppliedSla> {
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;
    let conversation_status: Option<String> = optional_column(row, "conversation_status");

    Ok(AppliedSla {
        id: row.try_get("id")?,
        conversation_id: row.try_get("conversation_id")?,
        sla_policy_id: row.try_get("sla_policy_id")?,
        status: parse_enum(&status)?,
        first_response_deadline_at: optional_timestamp(row, "first_response_deadline_at")?,
        resolution_deadline_at: optional_timestamp(row, "resolution_deadline_at")?,
        first_response_met_at: optional_timestamp(row, "first_response_met_at")?,
        first_response_breached_at: optional_timestamp(row, "first_response_breached_at")?,
        resolution_met_at: optional_timestamp(row, "resolution_met_at")?,
        resolution_breached_at: optional_timestamp(row, "resolution_breached_at")?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
        conversation_first_response_at: optional_timestamp(row, "conversation_first_response_at")?,
        conversation_resolved_at: optional_timestamp(row, "conversation_resolved_at")?,
        conversation_status: conversation_status.map(ConversationStatus::from),
    })
}

fn event_from_row(row: &AnyRow) -> DomainResult<SlaEvent> {
    let metric: String = row.try_get("metric")?;
    let status: String = row.try_get("status")?;
    let deadline_at: String = row.try_get("deadline_at")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(SlaEvent {
        id: row.try_get("id")?,
        applied_sla_id: row.try_get("applied_sla_id")?,
        sla_policy_id: row.try_get("sla_policy_id")?,
        metric: parse_enum(&metric)?,
        status: parse_enum(&status)?,
        deadline_at: parse_timestamp(&deadline_at)?,
        met_at: optional_timestamp(row, "met_at")?,
        breached_at: optional_timestamp(row, "breached_at")?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn notification_from_row(row: &AnyRow) -> DomainResult<ScheduledSlaNotification> {
    let metric: String = row.try_get("metric")?;
    let notification_type: String = row.try_get("notification_type")?;
    let recipients: String = row.try_get("recipients")?;
    let send_at: String = row.try_get("send_at")?;
    let created_at: String = row.try_get("created_at")?;
    let processed: i64 = row.try_get("processed")?;

    Ok(ScheduledSlaNotification {
        id: row.try_get("id")?,
        applied_sla_id: row.try_get("applied_sla_id")?,
        sla_event_id: optional_column(row, "sla_event_id"),
        metric: parse_enum(&metric)?,
        notification_type: parse_enum(&notification_type)?,
        recipients: serde_json::from_str::<Vec<NotificationRecipient>>(&recipients)?,
        send_at: parse_timestamp(&send_at)?,
        processed: processed != 0,
        processed_at: optional_timestamp(row, "processed_at")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

/// Met and breached columns of a metric tracked on the applied SLA row
fn terminal_columns(metric: SlaMetric) -> DomainResult<(&'static str, &'static str)> {
    match metric {
        SlaMetric::FirstResponse => Ok(("first_response_met_at", "first_response_breached_at")),
        SlaMetric::Resolution => Ok(("resolution_met_at", "resolution_breached_at")),
        SlaMetric::NextResponse => Err(DomainError::ValidationError(
            "next_response is tracked on SLA events, not on the applied SLA".to_string(),
        )),
    }
}

#[async_trait]
impl SlaRepository for Database {
    // ========================================
    // SLA Policy Operations
    // ========================================

    async fn create_sla_policy(&self, policy: &SlaPolicy) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO sla_policies (id, name, description, first_response_time, resolution_time, next_response_time, notifications, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&policy.id)
        .bind(&policy.name)
        .bind(&policy.description)
        .bind(&policy.first_response_time)
        .bind(&policy.resolution_time)
        .bind(&policy.next_response_time)
        .bind(serde_json::to_string(&policy.notifications)?)
        .bind(&policy.created_at)
        .bind(&policy.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_sla_policy(&self, policy_id: &str) -> DomainResult<Option<SlaPolicy>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM sla_policies WHERE id = ?",
            POLICY_COLUMNS
        ))
        .bind(policy_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(policy_from_row).transpose()
    }

    async fn list_sla_policies(&self) -> DomainResult<Vec<SlaPolicy>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM sla_policies ORDER BY name",
            POLICY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(policy_from_row).collect()
    }

    async fn update_sla_policy(&self, policy: &SlaPolicy) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE sla_policies
             SET name = ?, description = ?, first_response_time = ?, resolution_time = ?,
                 next_response_time = ?, notifications = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&policy.name)
        .bind(&policy.description)
        .bind(&policy.first_response_time)
        .bind(&policy.resolution_time)
        .bind(&policy.next_response_time)
        .bind(serde_json::to_string(&policy.notifications)?)
        .bind(&policy.updated_at)
        .bind(&policy.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!(
                "SLA policy not found: {}",
                policy.id
            )));
        }

        Ok(())
    }

    async fn delete_sla_policy(&self, policy_id: &str) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM sla_policies WHERE id = ?")
            .bind(policy_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!(
                "SLA policy not found: {}",
                policy_id
            )));
        }

        Ok(())
    }

    // ========================================
    // Applied SLA Operations
    // ========================================

    async fn create_applied_sla(&self, applied_sla: &AppliedSla) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO applied_slas (id, conversation_id, sla_policy_id, status,
                 first_response_deadline_at, resolution_deadline_at,
                 first_response_met_at, first_response_breached_at,
                 resolution_met_at, resolution_breached_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&applied_sla.id)
        .bind(&applied_sla.conversation_id)
        .bind(&applied_sla.sla_policy_id)
        .bind(applied_sla.status.to_string())
        .bind(format_optional_timestamp(applied_sla.first_response_deadline_at))
        .bind(format_optional_timestamp(applied_sla.resolution_deadline_at))
        .bind(format_optional_timestamp(applied_sla.first_response_met_at))
        .bind(format_optional_timestamp(applied_sla.first_response_breached_at))
        .bind(format_optional_timestamp(applied_sla.resolution_met_at))
        .bind(format_optional_timestamp(applied_sla.resolution_breached_at))
        .bind(format_timestamp(applied_sla.created_at))
        .bind(format_timestamp(applied_sla.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_applied_sla(&self, applied_sla_id: &str) -> DomainResult<Option<AppliedSla>> {
        let row = sqlx::query(&format!("{} WHERE a.id = ?", APPLIED_SLA_SELECT))
            .bind(applied_sla_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(applied_sla_from_row).transpose()
    }

    async fn get_latest_applied_sla_for_conversation(
        &self,
        conversation_id: &str,
    ) -> DomainResult<Option<AppliedSla>> {
        let row = sqlx::query(&format!(
            "{} WHERE a.conversation_id = ? ORDER BY a.created_at DESC, a.rowid DESC LIMIT 1",
            APPLIED_SLA_SELECT
        ))
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(applied_sla_from_row).transpose()
    }

    async fn list_pending_applied_slas(&self) -> DomainResult<Vec<AppliedSla>> {
        let rows = sqlx::query(&format!(
            "{} WHERE (a.first_response_deadline_at IS NOT NULL
                       AND a.first_response_met_at IS NULL
                       AND a.first_response_breached_at IS NULL)
                  OR (a.resolution_deadline_at IS NOT NULL
                       AND a.resolution_met_at IS NULL
                       AND a.resolution_breached_at IS NULL)
             ORDER BY a.created_at",
            APPLIED_SLA_SELECT
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(applied_sla_from_row).collect()
    }

    async fn update_applied_sla_deadlines(
        &self,
        applied_sla_id: &str,
        first_response_deadline_at: Option<DateTime<Utc>>,
        resolution_deadline_at: Option<DateTime<Utc>>,
    ) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE applied_slas
             SET first_response_deadline_at = CASE
                     WHEN first_response_met_at IS NULL AND first_response_breached_at IS NULL
                     THEN ? ELSE first_response_deadline_at END,
                 resolution_deadline_at = CASE
                     WHEN resolution_met_at IS NULL AND resolution_breached_at IS NULL
                     THEN ? ELSE resolution_deadline_at END,
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(format_optional_timestamp(first_response_deadline_at))
        .bind(format_optional_timestamp(resolution_deadline_at))
        .bind(format_timestamp(Utc::now()))
        .bind(applied_sla_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!(
                "Applied SLA not found: {}",
                applied_sla_id
            )));
        }

        Ok(())
    }

    async fn mark_applied_sla_met(
        &self,
        applied_sla_id: &str,
        metric: SlaMetric,
        met_at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let (met_column, breached_column) = terminal_columns(metric)?;
        let result = sqlx::query(&format!(
            "UPDATE applied_slas SET {met} = ?, updated_at = ?
             WHERE id = ? AND {met} IS NULL AND {breached} IS NULL",
            met = met_column,
            breached = breached_column
        ))
        .bind(format_timestamp(met_at))
        .bind(format_timestamp(Utc::now()))
        .bind(applied_sla_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_applied_sla_breached(
        &self,
        applied_sla_id: &str,
        metric: SlaMetric,
        breached_at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let (met_column, breached_column) = terminal_columns(metric)?;
        let result = sqlx::query(&format!(
            "UPDATE applied_slas SET {breached} = ?, updated_at = ?
             WHERE id = ? AND {met} IS NULL AND {breached} IS NULL",
            met = met_column,
            breached = breached_column
        ))
        .bind(format_timestamp(breached_at))
        .bind(format_timestamp(Utc::now()))
        .bind(applied_sla_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_applied_sla_status(
        &self,
        applied_sla_id: &str,
        status: AppliedSlaStatus,
    ) -> DomainResult<()> {
        sqlx::query("UPDATE applied_slas SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(format_timestamp(Utc::now()))
            .bind(applied_sla_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ========================================
    // SLA Event Operations
    // ========================================

    async fn create_sla_event(&self, event: &SlaEvent) -> DomainResult<bool> {
        // The partial unique index rejects a second open event
        let result = sqlx::query(
            "INSERT OR IGNORE INTO sla_events (id, applied_sla_id, sla_policy_id, metric, status, deadline_at, met_at, breached_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&event.id)
        .bind(&event.applied_sla_id)
        .bind(&event.sla_policy_id)
        .bind(event.metric.to_string())
        .bind(event.status.to_string())
        .bind(format_timestamp(event.deadline_at))
        .bind(format_optional_timestamp(event.met_at))
        .bind(format_optional_timestamp(event.breached_at))
        .bind(format_timestamp(event.created_at))
        .bind(format_timestamp(event.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_sla_event(&self, event_id: &str) -> DomainResult<Option<SlaEvent>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM sla_events WHERE id = ?",
            EVENT_COLUMNS
        ))
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(event_from_row).transpose()
    }

    async fn list_sla_events_for_applied_sla(
        &self,
        applied_sla_id: &str,
    ) -> DomainResult<Vec<SlaEvent>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM sla_events WHERE applied_sla_id = ? ORDER BY created_at, rowid",
            EVENT_COLUMNS
        ))
        .bind(applied_sla_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    async fn list_pending_sla_events(&self) -> DomainResult<Vec<SlaEvent>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM sla_events WHERE status = 'pending' ORDER BY deadline_at",
            EVENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    async fn set_latest_sla_event_met_at(
        &self,
        applied_sla_id: &str,
        metric: SlaMetric,
        met_at: DateTime<Utc>,
    ) -> DomainResult<Option<String>> {
        let row = sqlx::query(
            "UPDATE sla_events SET met_at = ?, updated_at = ?
             WHERE id = (
                 SELECT id FROM sla_events
                 WHERE applied_sla_id = ? AND metric = ? AND met_at IS NULL AND breached_at IS NULL
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1
             )
             AND met_at IS NULL AND breached_at IS NULL
             RETURNING id",
        )
        .bind(format_timestamp(met_at))
        .bind(format_timestamp(Utc::now()))
        .bind(applied_sla_id)
        .bind(metric.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .map(|row| row.try_get::<String, _>("id"))
            .transpose()?)
    }

    async fn mark_sla_event_met(&self, event_id: &str) -> DomainResult<bool> {
        let result = sqlx::query(
            "UPDATE sla_events SET status = 'met', updated_at = ?
             WHERE id = ? AND status = 'pending' AND met_at IS NOT NULL AND breached_at IS NULL",
        )
        .bind(format_timestamp(Utc::now()))
        .bind(event_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_sla_event_breached(
        &self,
        event_id: &str,
        breached_at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let result = sqlx::query(
            "UPDATE sla_events SET status = 'breached', breached_at = ?, updated_at = ?
             WHERE id = ? AND status = 'pending' AND breached_at IS NULL",
        )
        .bind(format_timestamp(breached_at))
        .bind(format_timestamp(Utc::now()))
        .bind(event_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ========================================
    // Scheduled Notification Operations
    // ========================================

    async fn create_scheduled_notification(
        &self,
        notification: &ScheduledSlaNotification,
    ) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO scheduled_sla_notifications (id, applied_sla_id, sla_event_id, metric, notification_type, recipients, send_at, processed, processed_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&notification.id)
        .bind(&notification.applied_sla_id)
        .bind(&notification.sla_event_id)
        .bind(notification.metric.to_string())
        .bind(notification.notification_type.to_string())
        .bind(serde_json::to_string(&notification.recipients)?)
        .bind(format_timestamp(notification.send_at))
        .bind(i64::from(notification.processed))
        .bind(format_optional_timestamp(notification.processed_at))
        .bind(format_timestamp(notification.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_due_notifications(
        &self,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<ScheduledSlaNotification>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM scheduled_sla_notifications
             WHERE processed = 0 AND send_at <= ?
             ORDER BY send_at",
            NOTIFICATION_COLUMNS
        ))
        .bind(format_timestamp(now))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(notification_from_row).collect()
    }

    async fn list_notifications_for_applied_sla(
        &self,
        applied_sla_id: &str,
    ) -> DomainResult<Vec<ScheduledSlaNotification>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM scheduled_sla_notifications
             WHERE applied_sla_id = ?
             ORDER BY send_at, rowid",
            NOTIFICATION_COLUMNS
        ))
        .bind(applied_sla_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(notification_from_row).collect()
    }

    async fn mark_notification_processed(
        &self,
        notification_id: &str,
        processed_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        sqlx::query(
            "UPDATE scheduled_sla_notifications SET processed = 1, processed_at = ?
             WHERE id = ? AND processed = 0",
        )
        .bind(format_timestamp(processed_at))
        .bind(notification_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
