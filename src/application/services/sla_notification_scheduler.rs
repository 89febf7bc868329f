use crate::domain::{
    entities::{NotificationRule, ScheduledSlaNotification, SlaBreaches, SlaDeadlines, SlaNotificationType},
    ports::{sla_repository::SlaRepository, time_service::TimeService},
};
use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Notifications whose send time is further in the past than this are dropped
/// instead of being sent immediately.
pub const STALE_NOTIFICATION_GRACE_MINUTES: i64 = 5;

/// Turns a policy's notification rules into persisted, timestamped entries
#[derive(Clone)]
pub struct SlaNotificationScheduler {
    sla_repo: Arc<dyn SlaRepository>,
    time_service: Arc<dyn TimeService>,
}

impl SlaNotificationScheduler {
    pub fn new(sla_repo: Arc<dyn SlaRepository>, time_service: Arc<dyn TimeService>) -> Self {
        Self {
            sla_repo,
            time_service,
        }
    }

    /// Schedule every rule against the given deadlines (warnings) and breach
    /// times (breaches). Returns how many notifications were persisted.
    ///
    /// Callers pass only the metrics relevant to the call; unset entries are
    /// skipped. A failing rule never aborts its siblings.
    pub async fn schedule_notifications(
        &self,
        rules: &[NotificationRule],
        applied_sla_id: &str,
        sla_event_id: Option<&str>,
        deadlines: &SlaDeadlines,
        breaches: &SlaBreaches,
    ) -> usize {
        let now = self.time_service.now();
        let stale_before = now - Duration::minutes(STALE_NOTIFICATION_GRACE_MINUTES);
        let mut scheduled = 0;

        for rule in rules {
            let delay = match rule.delay() {
                Ok(delay) => delay,
                Err(e) => {
                    warn!(
                        "Skipping SLA notification rule with invalid delay '{}' for applied SLA {}: {}",
                        rule.delay, applied_sla_id, e
                    );
                    continue;
                }
            };

            let targets: Vec<_> = match rule.notification_type {
                SlaNotificationType::Warning => deadlines
                    .iter()
                    .map(|(metric, deadline)| (metric, deadline - delay))
                    .collect(),
                SlaNotificationType::Breach => breaches
                    .iter()
                    .map(|(metric, breached_at)| (metric, breached_at + delay))
                    .collect(),
            };

            for (metric, send_at) in targets {
                if send_at < stale_before {
                    debug!(
                        "Dropping stale {} notification for {} on applied SLA {} (send_at {})",
                        rule.notification_type, metric, applied_sla_id, send_at
                    );
                    continue;
                }

                let notification = ScheduledSlaNotification::new(
                    applied_sla_id.to_string(),
                    sla_event_id.map(str::to_string),
                    metric,
                    rule.notification_type,
                    rule.recipients.clone(),
                    send_at,
                );

                match self
                    .sla_repo
                    .create_scheduled_notification(&notification)
                    .await
                {
                    Ok(()) => {
                        metrics::counter!(
                            "sla_notifications_scheduled_total",
                            "type" => rule.notification_type.as_str()
                        )
                        .increment(1);
                        debug!(
                            "Scheduled {} notification {} for {} on applied SLA {} at {}",
                            rule.notification_type, notification.id, metric, applied_sla_id, send_at
                        );
                        scheduled += 1;
                    }
                    Err(e) => {
                        metrics::counter!(
                            "sla_notifications_failed_total",
                            "stage" => "schedule"
                        )
                        .increment(1);
                        error!(
                            "Failed to schedule {} notification for applied SLA {}: {}",
                            rule.notification_type, applied_sla_id, e
                        );
                    }
                }
            }
        }

        scheduled
    }
}
