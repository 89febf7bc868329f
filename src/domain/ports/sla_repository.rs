use chrono::{DateTime, Utc};

use crate::domain::entities::{
    AppliedSla, AppliedSlaStatus, ScheduledSlaNotification, SlaEvent, SlaMetric, SlaPolicy,
};
use crate::domain::errors::DomainResult;

/// Repository for SLA operations.
///
/// Every mutating call touches a single row. Terminal-field updates are
/// guarded and report whether this caller performed the transition.
#[async_trait::async_trait]
pub trait SlaRepository: Send + Sync {
    // SLA Policy operations
    async fn create_sla_policy(&self, policy: &SlaPolicy) -> DomainResult<()>;
    async fn get_sla_policy(&self, policy_id: &str) -> DomainResult<Option<SlaPolicy>>;
    async fn list_sla_policies(&self) -> DomainResult<Vec<SlaPolicy>>;
    async fn update_sla_policy(&self, policy: &SlaPolicy) -> DomainResult<()>;
    async fn delete_sla_policy(&self, policy_id: &str) -> DomainResult<()>;

    // Applied SLA operations
    async fn create_applied_sla(&self, applied_sla: &AppliedSla) -> DomainResult<()>;
    async fn get_applied_sla(&self, applied_sla_id: &str) -> DomainResult<Option<AppliedSla>>;
    async fn get_latest_applied_sla_for_conversation(
        &self,
        conversation_id: &str,
    ) -> DomainResult<Option<AppliedSla>>;
    /// Applied SLAs with at least one tracked metric neither met nor breached
    async fn list_pending_applied_slas(&self) -> DomainResult<Vec<AppliedSla>>;
    /// Only rewrites deadlines of metrics that are not terminal yet
    async fn update_applied_sla_deadlines(
        &self,
        applied_sla_id: &str,
        first_response_deadline_at: Option<DateTime<Utc>>,
        resolution_deadline_at: Option<DateTime<Utc>>,
    ) -> DomainResult<()>;
    async fn mark_applied_sla_met(
        &self,
        applied_sla_id: &str,
        metric: SlaMetric,
        met_at: DateTime<Utc>,
    ) -> DomainResult<bool>;
    async fn mark_applied_sla_breached(
        &self,
        applied_sla_id: &str,
        metric: SlaMetric,
        breached_at: DateTime<Utc>,
    ) -> DomainResult<bool>;
    async fn update_applied_sla_status(
        &self,
        applied_sla_id: &str,
        status: AppliedSlaStatus,
    ) -> DomainResult<()>;

    // SLA Event operations
    /// Returns false when an open event already exists for the applied SLA
    async fn create_sla_event(&self, event: &SlaEvent) -> DomainResult<bool>;
    async fn get_sla_event(&self, event_id: &str) -> DomainResult<Option<SlaEvent>>;
    async fn list_sla_events_for_applied_sla(
        &self,
        applied_sla_id: &str,
    ) -> DomainResult<Vec<SlaEvent>>;
    async fn list_pending_sla_events(&self) -> DomainResult<Vec<SlaEvent>>;
    /// Stamps `met_at` on the latest open event of the metric, returning its id
    async fn set_latest_sla_event_met_at(
        &self,
        applied_sla_id: &str,
        metric: SlaMetric,
        met_at: DateTime<Utc>,
    ) -> DomainResult<Option<String>>;
    async fn mark_sla_event_met(&self, event_id: &str) -> DomainResult<bool>;
    async fn mark_sla_event_breached(
        &self,
        event_id: &str,
        breached_at: DateTime<Utc>,
    ) -> DomainResult<bool>;

    // Scheduled notification operations
    async fn create_scheduled_notification(
        &self,
        notification: &ScheduledSlaNotification,
    ) -> DomainResult<()>;
    async fn list_due_notifications(
        &self,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<ScheduledSlaNotification>>;
    async fn list_notifications_for_applied_sla(
        &self,
        applied_sla_id: &str,
    ) -> DomainResult<Vec<ScheduledSlaNotification>>;
    async fn mark_notification_processed(
        &self,
        notification_id: &str,
        processed_at: DateTime<Utc>,
    ) -> DomainResult<()>;
}
