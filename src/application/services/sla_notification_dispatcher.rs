use crate::{
    domain::{
        entities::{
            Agent, AppliedSla, ConversationSlaState, NotificationRecipient,
            ScheduledSlaNotification, SlaMetric, SlaNotificationType,
        },
        errors::DomainResult,
        ports::{
            agent_repository::AgentRepository,
            conversation_repository::ConversationRepository,
            notifier::{NotificationMessage, Notifier, EMAIL_PROVIDER},
            sla_repository::SlaRepository,
            template_repository::TemplateRenderer,
            time_service::TimeService,
        },
    },
    shared::utils::format_relative_duration,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const WARNING_TEMPLATE: &str = "sla-breach-warning";
pub const BREACH_TEMPLATE: &str = "sla-breached";

/// Deadline and breach time of the metric a notification is about
#[derive(Debug, Clone, Copy)]
struct MetricTarget {
    deadline: Option<DateTime<Utc>>,
    breached_at: Option<DateTime<Utc>>,
}

/// Sends due SLA notifications. Each scheduled row gets exactly one attempt.
#[derive(Clone)]
pub struct SlaNotificationDispatcher {
    sla_repo: Arc<dyn SlaRepository>,
    conversation_repo: Arc<dyn ConversationRepository>,
    agent_repo: Arc<dyn AgentRepository>,
    renderer: Arc<dyn TemplateRenderer>,
    notifier: Arc<dyn Notifier>,
    time_service: Arc<dyn TimeService>,
}

impl SlaNotificationDispatcher {
    pub fn new(
        sla_repo: Arc<dyn SlaRepository>,
        conversation_repo: Arc<dyn ConversationRepository>,
        agent_repo: Arc<dyn AgentRepository>,
        renderer: Arc<dyn TemplateRenderer>,
        notifier: Arc<dyn Notifier>,
        time_service: Arc<dyn TimeService>,
    ) -> Self {
        Self {
            sla_repo,
            conversation_repo,
            agent_repo,
            renderer,
            notifier,
            time_service,
        }
    }

    /// One dispatch pass. Returns how many notifications were marked processed.
    ///
    /// A store error leaves that notification unprocessed so the next pass
    /// picks it up again.
    pub async fn send_due_notifications(&self, cancel: &CancellationToken) -> DomainResult<usize> {
        let due = self
            .sla_repo
            .list_due_notifications(self.time_service.now())
            .await?;
        if due.is_empty() {
            return Ok(0);
        }

        debug!("Found {} due SLA notifications", due.len());
        let mut processed = 0;

        for notification in due {
            if cancel.is_cancelled() {
                info!("SLA notification dispatch cancelled");
                break;
            }

            match self.dispatch(&notification).await {
                Ok(()) => processed += 1,
                Err(e) => error!(
                    "Failed to dispatch SLA notification {}: {}",
                    notification.id, e
                ),
            }
        }

        Ok(processed)
    }

    async fn dispatch(&self, notification: &ScheduledSlaNotification) -> DomainResult<()> {
        let Some(applied_sla) = self
            .sla_repo
            .get_applied_sla(&notification.applied_sla_id)
            .await?
        else {
            warn!(
                "Applied SLA {} not found, dropping notification {}",
                notification.applied_sla_id, notification.id
            );
            return self.mark_processed(notification).await;
        };

        let Some(conversation) = self
            .conversation_repo
            .get_conversation_sla_state(&applied_sla.conversation_id)
            .await?
        else {
            warn!(
                "Conversation {} not found, dropping notification {}",
                applied_sla.conversation_id, notification.id
            );
            return self.mark_processed(notification).await;
        };

        if conversation.status.is_finished() {
            debug!(
                "Conversation {} is {}, skipping notification {}",
                conversation.id, conversation.status, notification.id
            );
            return self.mark_processed(notification).await;
        }

        let Some(target) = self.metric_target(notification, &applied_sla).await? else {
            debug!(
                "SLA {} already met, skipping notification {}",
                notification.metric, notification.id
            );
            return self.mark_processed(notification).await;
        };

        let now = self.time_service.now();
        let (template, due_in, overdue_by) = match notification.notification_type {
            SlaNotificationType::Warning => (
                WARNING_TEMPLATE,
                target
                    .deadline
                    .map(|deadline| format_relative_duration(deadline - now))
                    .unwrap_or_default(),
                String::new(),
            ),
            SlaNotificationType::Breach => (
                BREACH_TEMPLATE,
                String::new(),
                target
                    .deadline
                    .or(target.breached_at)
                    .map(|deadline| format_relative_duration(now - deadline))
                    .unwrap_or_default(),
            ),
        };

        let mut attempted = HashSet::new();
        for recipient in &notification.recipients {
            let agent_id = match recipient {
                NotificationRecipient::Agent(id) => id.clone(),
                NotificationRecipient::AssignedUser => match &conversation.assigned_user_id {
                    Some(id) => id.clone(),
                    None => {
                        debug!(
                            "Conversation {} is unassigned, no assignee for notification {}",
                            conversation.id, notification.id
                        );
                        continue;
                    }
                },
            };
            if !attempted.insert(agent_id.clone()) {
                continue;
            }

            let agent = match self.agent_repo.get_agent(&agent_id).await {
                Ok(Some(agent)) => agent,
                Ok(None) => {
                    warn!(
                        "Agent {} not found for SLA notification {}",
                        agent_id, notification.id
                    );
                    continue;
                }
                Err(e) => {
                    metrics::counter!("sla_notifications_failed_total", "stage" => "recipient")
                        .increment(1);
                    error!(
                        "Failed to load agent {} for SLA notification {}: {}",
                        agent_id, notification.id, e
                    );
                    continue;
                }
            };

            let data = template_data(&conversation, &agent, notification.metric, &due_in, &overdue_by);
            let rendered = match self.renderer.render_stored_template(template, &data).await {
                Ok(rendered) => rendered,
                Err(e) => {
                    metrics::counter!("sla_notifications_failed_total", "stage" => "render")
                        .increment(1);
                    error!(
                        "Failed to render template {} for SLA notification {}: {}",
                        template, notification.id, e
                    );
                    continue;
                }
            };

            let message = NotificationMessage {
                recipient_emails: vec![agent.email.clone()],
                subject: rendered.subject,
                content: rendered.body,
                provider: EMAIL_PROVIDER.to_string(),
            };
            match self.notifier.send(message).await {
                Ok(()) => {
                    metrics::counter!(
                        "sla_notifications_sent_total",
                        "type" => notification.notification_type.as_str()
                    )
                    .increment(1);
                    info!(
                        "Sent SLA {} notification for {} on conversation {} to {} via {}",
                        notification.notification_type,
                        notification.metric,
                        conversation.id,
                        agent.email,
                        self.notifier.provider_name()
                    );
                }
                Err(e) => {
                    metrics::counter!("sla_notifications_failed_total", "stage" => "send")
                        .increment(1);
                    error!(
                        "Failed to send SLA notification {} to {}: {}",
                        notification.id, agent.email, e
                    );
                }
            }
        }

        self.mark_processed(notification).await
    }

    /// `None` when the metric is already met and the notification is stale
    async fn metric_target(
        &self,
        notification: &ScheduledSlaNotification,
        applied_sla: &AppliedSla,
    ) -> DomainResult<Option<MetricTarget>> {
        if let Some(event_id) = &notification.sla_event_id {
            let target = self
                .sla_repo
                .get_sla_event(event_id)
                .await?
                .filter(|event| !event.is_met())
                .map(|event| MetricTarget {
                    deadline: Some(event.deadline_at),
                    breached_at: event.breached_at,
                });
            return Ok(target);
        }

        Ok(applied_sla
            .metric_state(notification.metric)
            .filter(|state| !state.is_met())
            .map(|state| MetricTarget {
                deadline: state.deadline,
                breached_at: state.breached_at,
            }))
    }

    async fn mark_processed(&self, notification: &ScheduledSlaNotification) -> DomainResult<()> {
        self.sla_repo
            .mark_notification_processed(&notification.id, self.time_service.now())
            .await
    }
}

fn metric_label(metric: SlaMetric) -> &'static str {
    match metric {
        SlaMetric::FirstResponse => "First response",
        SlaMetric::Resolution => "Resolution",
        SlaMetric::NextResponse => "Next response",
    }
}

/// Data context handed to the notification templates
pub fn template_data(
    conversation: &ConversationSlaState,
    agent: &Agent,
    metric: SlaMetric,
    due_in: &str,
    overdue_by: &str,
) -> serde_json::Value {
    json!({
        "Conversation": {
            "ID": conversation.id,
            "ReferenceNumber": conversation.reference_number,
            "Subject": conversation.subject.clone().unwrap_or_default(),
        },
        "Recipient": {
            "ID": agent.id,
            "FirstName": agent.first_name,
            "LastName": agent.last_name.clone().unwrap_or_default(),
            "FullName": agent.full_name(),
            "Email": agent.email,
        },
        "SLA": {
            "Metric": metric_label(metric),
            "DueIn": due_in,
            "OverdueBy": overdue_by,
        },
    })
}
