use crate::{
    application::services::sla_notification_scheduler::SlaNotificationScheduler,
    domain::{
        entities::{
            parse_optional_duration, AppliedSla, BusinessHours, CreateSlaPolicyRequest,
            NextResponseOutcome, ScheduledSlaNotification, SlaBreaches, SlaDeadlines, SlaEvent,
            SlaMetric, SlaPolicy, UpdateSlaPolicyRequest,
        },
        errors::{DomainError, DomainResult},
        ports::{
            business_hours_repository::BusinessHoursRepository,
            conversation_repository::ConversationRepository,
            settings_repository::SettingsRepository, sla_repository::SlaRepository,
            team_repository::TeamRepository, time_service::TimeService,
        },
        services::calculate_deadline,
    },
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const APP_SETTINGS_PREFIX: &str = "app";
const APP_BUSINESS_HOURS_KEY: &str = "app.business_hours_id";
const APP_TIMEZONE_KEY: &str = "app.timezone";

const TRACKED_METRICS: [SlaMetric; 3] = [
    SlaMetric::FirstResponse,
    SlaMetric::Resolution,
    SlaMetric::NextResponse,
];

/// Service for managing SLA policies, applied SLAs, and SLA events
#[derive(Clone)]
pub struct SlaService {
    sla_repo: Arc<dyn SlaRepository>,
    team_repo: Arc<dyn TeamRepository>,
    business_hours_repo: Arc<dyn BusinessHoursRepository>,
    settings_repo: Arc<dyn SettingsRepository>,
    conversation_repo: Arc<dyn ConversationRepository>,
    scheduler: SlaNotificationScheduler,
    time_service: Arc<dyn TimeService>,
}

impl SlaService {
    pub fn new(
        sla_repo: Arc<dyn SlaRepository>,
        team_repo: Arc<dyn TeamRepository>,
        business_hours_repo: Arc<dyn BusinessHoursRepository>,
        settings_repo: Arc<dyn SettingsRepository>,
        conversation_repo: Arc<dyn ConversationRepository>,
        scheduler: SlaNotificationScheduler,
        time_service: Arc<dyn TimeService>,
    ) -> Self {
        Self {
            sla_repo,
            team_repo,
            business_hours_repo,
            settings_repo,
            conversation_repo,
            scheduler,
            time_service,
        }
    }

    // ========================================
    // SLA Policy Management
    // ========================================

    pub async fn create_policy(&self, request: CreateSlaPolicyRequest) -> DomainResult<SlaPolicy> {
        let policy = SlaPolicy::new(
            request.name,
            request.description,
            request.first_response_time,
            request.resolution_time,
            request.next_response_time,
            request.notifications,
        );
        policy.validate().map_err(DomainError::ValidationError)?;

        self.sla_repo.create_sla_policy(&policy).await?;

        info!("Created SLA policy: {} ({})", policy.name, policy.id);
        Ok(policy)
    }

    pub async fn get_policy(&self, policy_id: &str) -> DomainResult<SlaPolicy> {
        self.sla_repo
            .get_sla_policy(policy_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("SLA policy not found: {}", policy_id)))
    }

    pub async fn list_policies(&self) -> DomainResult<Vec<SlaPolicy>> {
        self.sla_repo.list_sla_policies().await
    }

    pub async fn update_policy(
        &self,
        policy_id: &str,
        request: UpdateSlaPolicyRequest,
    ) -> DomainResult<SlaPolicy> {
        let mut policy = self.get_policy(policy_id).await?;

        if let Some(name) = request.name {
            policy.name = name;
        }
        if let Some(description) = request.description {
            policy.description = description;
        }
        if let Some(time) = request.first_response_time {
            policy.first_response_time = time;
        }
        if let Some(time) = request.resolution_time {
            policy.resolution_time = time;
        }
        if let Some(time) = request.next_response_time {
            policy.next_response_time = time;
        }
        if let Some(notifications) = request.notifications {
            policy.notifications = notifications;
        }
        policy.validate().map_err(DomainError::ValidationError)?;
        policy.updated_at = self.time_service.now().to_rfc3339();

        self.sla_repo.update_sla_policy(&policy).await?;

        info!("Updated SLA policy: {}", policy_id);
        Ok(policy)
    }

    pub async fn delete_policy(&self, policy_id: &str) -> DomainResult<()> {
        self.sla_repo.delete_sla_policy(policy_id).await?;
        info!("Deleted SLA policy: {}", policy_id);
        Ok(())
    }

    // ========================================
    // Applied SLA Management
    // ========================================

    pub async fn get_applied_sla(&self, applied_sla_id: &str) -> DomainResult<AppliedSla> {
        self.sla_repo
            .get_applied_sla(applied_sla_id)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound(format!("Applied SLA not found: {}", applied_sla_id))
            })
    }

    pub async fn get_latest_applied_sla(
        &self,
        conversation_id: &str,
    ) -> DomainResult<Option<AppliedSla>> {
        self.sla_repo
            .get_latest_applied_sla_for_conversation(conversation_id)
            .await
    }

    pub async fn list_events(&self, applied_sla_id: &str) -> DomainResult<Vec<SlaEvent>> {
        self.sla_repo
            .list_sla_events_for_applied_sla(applied_sla_id)
            .await
    }

    pub async fn list_scheduled_notifications(
        &self,
        applied_sla_id: &str,
    ) -> DomainResult<Vec<ScheduledSlaNotification>> {
        self.sla_repo
            .list_notifications_for_applied_sla(applied_sla_id)
            .await
    }

    /// Bind a policy to a conversation, computing deadlines from `start` in
    /// the team's business hours. Returns the policy that was applied.
    pub async fn apply_sla(
        &self,
        start: DateTime<Utc>,
        conversation_id: &str,
        team_id: Option<&str>,
        policy_id: &str,
    ) -> DomainResult<SlaPolicy> {
        let policy = self.get_policy(policy_id).await?;

        let mut deadlines = self.get_deadlines(start, &policy, team_id).await?;
        // Next response deadlines belong to SLA events
        deadlines.next_response = None;

        let applied_sla = AppliedSla::new(
            conversation_id.to_string(),
            policy.id.clone(),
            deadlines.first_response,
            deadlines.resolution,
        );
        self.sla_repo.create_applied_sla(&applied_sla).await?;

        if let Err(e) = self
            .conversation_repo
            .update_next_sla_deadline(conversation_id, deadlines.earliest())
            .await
        {
            error!(
                "Failed to update next SLA deadline for conversation {}: {}",
                conversation_id, e
            );
        }

        self.scheduler
            .schedule_notifications(
                &policy.notifications,
                &applied_sla.id,
                None,
                &deadlines,
                &SlaBreaches::default(),
            )
            .await;

        info!(
            "Applied SLA policy {} to conversation {} (first_response: {:?}, resolution: {:?})",
            policy.id, conversation_id, deadlines.first_response, deadlines.resolution
        );

        Ok(policy)
    }

    /// Deadlines for every metric the policy tracks, computed from `start`.
    pub async fn get_deadlines(
        &self,
        start: DateTime<Utc>,
        policy: &SlaPolicy,
        team_id: Option<&str>,
    ) -> DomainResult<SlaDeadlines> {
        let mut budgets = Vec::new();
        for metric in TRACKED_METRICS {
            let seconds = parse_optional_duration(policy.duration_for(metric)).map_err(|e| {
                DomainError::ValidationError(format!("Invalid {}_time: {}", metric, e))
            })?;
            if let Some(seconds) = seconds {
                budgets.push((metric, budget_minutes(seconds)));
            }
        }

        let mut deadlines = SlaDeadlines::default();
        if budgets.is_empty() {
            return Ok(deadlines);
        }

        let (business_hours, timezone) = self.resolve_business_hours(team_id).await?;
        for (metric, minutes) in budgets {
            let deadline = calculate_deadline(start, minutes, &business_hours, &timezone)?;
            deadlines.set(metric, Some(deadline));
        }

        Ok(deadlines)
    }

    /// Recompute first response and resolution deadlines from `start`.
    /// Metrics that are already met or breached keep their deadline.
    pub async fn recalculate_deadlines(
        &self,
        applied_sla_id: &str,
        start: DateTime<Utc>,
        team_id: Option<&str>,
    ) -> DomainResult<AppliedSla> {
        let applied_sla = self.get_applied_sla(applied_sla_id).await?;
        let policy = self.get_policy(&applied_sla.sla_policy_id).await?;
        let deadlines = self.get_deadlines(start, &policy, team_id).await?;

        self.sla_repo
            .update_applied_sla_deadlines(
                applied_sla_id,
                deadlines.first_response,
                deadlines.resolution,
            )
            .await?;
        self.refresh_applied_sla(applied_sla_id).await?;

        info!("Recalculated SLA deadlines for applied SLA {}", applied_sla_id);
        self.get_applied_sla(applied_sla_id).await
    }

    // ========================================
    // SLA Event Management
    // ========================================

    /// Open a next-response obligation for the conversation's latest applied SLA,
    /// due one next-response budget from now.
    pub async fn create_next_response_event(
        &self,
        conversation_id: &str,
        team_id: Option<&str>,
    ) -> DomainResult<NextResponseOutcome> {
        let applied_sla = self
            .sla_repo
            .get_latest_applied_sla_for_conversation(conversation_id)
            .await?
            .ok_or_else(|| {
                DomainError::NotFound(format!(
                    "No applied SLA for conversation: {}",
                    conversation_id
                ))
            })?;
        let policy = self.get_policy(&applied_sla.sla_policy_id).await?;

        let seconds = match parse_optional_duration(&policy.next_response_time)
            .map_err(|e| DomainError::ValidationError(format!("Invalid next_response_time: {}", e)))?
        {
            Some(seconds) => seconds,
            None => {
                debug!(
                    "SLA policy {} has no next response time, skipping event for conversation {}",
                    policy.id, conversation_id
                );
                return Ok(NextResponseOutcome::NotConfigured);
            }
        };

        let (business_hours, timezone) = self.resolve_business_hours(team_id).await?;
        let now = self.time_service.now();
        let deadline = calculate_deadline(now, budget_minutes(seconds), &business_hours, &timezone)?;

        let event = SlaEvent::new(
            applied_sla.id.clone(),
            policy.id.clone(),
            SlaMetric::NextResponse,
            deadline,
        );
        if !self.sla_repo.create_sla_event(&event).await? {
            debug!(
                "Open next response SLA event already exists for applied SLA {}",
                applied_sla.id
            );
            return Ok(NextResponseOutcome::AlreadyExists);
        }

        if let Err(e) = self.refresh_applied_sla(&applied_sla.id).await {
            error!(
                "Failed to refresh applied SLA {} after creating event {}: {}",
                applied_sla.id, event.id, e
            );
        }

        self.scheduler
            .schedule_notifications(
                &policy.notifications,
                &applied_sla.id,
                Some(&event.id),
                &SlaDeadlines::only(SlaMetric::NextResponse, deadline),
                &SlaBreaches::default(),
            )
            .await;

        info!(
            "Next response SLA event {} created for conversation {} (deadline: {})",
            event.id, conversation_id, deadline
        );
        Ok(NextResponseOutcome::Created(event))
    }

    /// Record a reply on the latest open event of the metric. The event is
    /// judged met or breached by the next evaluation pass.
    pub async fn set_latest_sla_event_met_at(
        &self,
        applied_sla_id: &str,
        metric: SlaMetric,
        met_at: DateTime<Utc>,
    ) -> DomainResult<Option<String>> {
        let event_id = self
            .sla_repo
            .set_latest_sla_event_met_at(applied_sla_id, metric, met_at)
            .await?;
        if let Some(id) = &event_id {
            debug!("Recorded {} reply at {} on SLA event {}", metric, met_at, id);
        }
        Ok(event_id)
    }

    // ========================================
    // Evaluation
    // ========================================

    /// One pass over applied SLAs that still have an open metric.
    /// Returns how many were evaluated without error.
    pub async fn evaluate_pending_slas(&self, cancel: &CancellationToken) -> DomainResult<usize> {
        let applied_slas = self.sla_repo.list_pending_applied_slas().await?;
        let mut evaluated = 0;

        for applied_sla in applied_slas {
            if cancel.is_cancelled() {
                info!("SLA evaluation cancelled");
                break;
            }

            match self.evaluate_applied_sla(&applied_sla).await {
                Ok(()) => evaluated += 1,
                Err(e) => error!("Failed to evaluate applied SLA {}: {}", applied_sla.id, e),
            }
        }

        Ok(evaluated)
    }

    async fn evaluate_applied_sla(&self, applied_sla: &AppliedSla) -> DomainResult<()> {
        let now = self.time_service.now();
        let mut policy: Option<SlaPolicy> = None;

        for metric in [SlaMetric::FirstResponse, SlaMetric::Resolution] {
            let Some(state) = applied_sla.metric_state(metric) else {
                continue;
            };
            let Some(deadline) = state.deadline else {
                continue;
            };
            if state.is_terminal() {
                continue;
            }

            let breached = match state.completed_at {
                Some(completed_at) if completed_at <= deadline => {
                    if self
                        .sla_repo
                        .mark_applied_sla_met(&applied_sla.id, metric, completed_at)
                        .await?
                    {
                        metrics::counter!("sla_met_total", "metric" => metric.as_str())
                            .increment(1);
                        info!(
                            "SLA {} met for conversation {} (applied SLA {})",
                            metric, applied_sla.conversation_id, applied_sla.id
                        );
                    }
                    false
                }
                Some(_) => true,
                None => now > deadline,
            };

            if !breached {
                continue;
            }

            if !self
                .sla_repo
                .mark_applied_sla_breached(&applied_sla.id, metric, now)
                .await?
            {
                // Another evaluator recorded the outcome first
                continue;
            }

            metrics::counter!("sla_breaches_total", "metric" => metric.as_str()).increment(1);
            warn!(
                "SLA {} breached for conversation {} (applied SLA {}, deadline {})",
                metric, applied_sla.conversation_id, applied_sla.id, deadline
            );

            if policy.is_none() {
                policy = self
                    .sla_repo
                    .get_sla_policy(&applied_sla.sla_policy_id)
                    .await?;
            }
            match &policy {
                Some(policy) => {
                    self.scheduler
                        .schedule_notifications(
                            &policy.notifications,
                            &applied_sla.id,
                            None,
                            &SlaDeadlines::default(),
                            &SlaBreaches::only(metric, now),
                        )
                        .await;
                }
                None => warn!(
                    "SLA policy {} not found, no breach notifications for applied SLA {}",
                    applied_sla.sla_policy_id, applied_sla.id
                ),
            }
        }

        // The display field is cleared after every pass; event creation and
        // recalculation set it again.
        self.refresh_status(&applied_sla.id).await?;
        self.conversation_repo
            .update_next_sla_deadline(&applied_sla.conversation_id, None)
            .await
    }

    /// One pass over SLA events still pending a verdict.
    /// Returns how many were evaluated without error.
    pub async fn evaluate_pending_events(&self, cancel: &CancellationToken) -> DomainResult<usize> {
        let events = self.sla_repo.list_pending_sla_events().await?;
        let mut policies: HashMap<String, Option<SlaPolicy>> = HashMap::new();
        let mut evaluated = 0;

        for event in events {
            if cancel.is_cancelled() {
                info!("SLA event evaluation cancelled");
                break;
            }

            match self.evaluate_sla_event(&event, &mut policies).await {
                Ok(()) => evaluated += 1,
                Err(e) => error!("Failed to evaluate SLA event {}: {}", event.id, e),
            }
        }

        Ok(evaluated)
    }

    async fn evaluate_sla_event(
        &self,
        event: &SlaEvent,
        policies: &mut HashMap<String, Option<SlaPolicy>>,
    ) -> DomainResult<()> {
        if !policies.contains_key(&event.sla_policy_id) {
            let policy = self.sla_repo.get_sla_policy(&event.sla_policy_id).await?;
            policies.insert(event.sla_policy_id.clone(), policy);
        }
        let Some(policy) = policies.get(&event.sla_policy_id).and_then(Option::as_ref) else {
            warn!(
                "SLA policy {} not found, skipping SLA event {}",
                event.sla_policy_id, event.id
            );
            return Ok(());
        };

        let now = self.time_service.now();
        let breached = match event.met_at {
            Some(met_at) if met_at <= event.deadline_at => {
                if self.sla_repo.mark_sla_event_met(&event.id).await? {
                    metrics::counter!("sla_met_total", "metric" => event.metric.as_str())
                        .increment(1);
                    info!(
                        "SLA event {} ({}) met for applied SLA {}",
                        event.id, event.metric, event.applied_sla_id
                    );
                }
                false
            }
            Some(_) => true,
            None if now > event.deadline_at => true,
            None => return Ok(()),
        };

        if breached
            && self
                .sla_repo
                .mark_sla_event_breached(&event.id, now)
                .await?
        {
            metrics::counter!("sla_breaches_total", "metric" => event.metric.as_str())
                .increment(1);
            warn!(
                "SLA event {} ({}) breached for applied SLA {} (deadline {})",
                event.id, event.metric, event.applied_sla_id, event.deadline_at
            );

            self.scheduler
                .schedule_notifications(
                    &policy.notifications,
                    &event.applied_sla_id,
                    Some(&event.id),
                    &SlaDeadlines::default(),
                    &SlaBreaches::only(event.metric, now),
                )
                .await;
        }

        self.refresh_applied_sla(&event.applied_sla_id).await
    }

    /// Recompute the aggregate status and the conversation's next SLA deadline
    async fn refresh_applied_sla(&self, applied_sla_id: &str) -> DomainResult<()> {
        let (applied_sla, events) = self.refresh_status(applied_sla_id).await?;

        let next_deadline = applied_sla
            .open_deadlines()
            .earliest()
            .into_iter()
            .chain(events.iter().filter(|e| e.is_open()).map(|e| e.deadline_at))
            .min();
        self.conversation_repo
            .update_next_sla_deadline(&applied_sla.conversation_id, next_deadline)
            .await
    }

    async fn refresh_status(
        &self,
        applied_sla_id: &str,
    ) -> DomainResult<(AppliedSla, Vec<SlaEvent>)> {
        let applied_sla = self.get_applied_sla(applied_sla_id).await?;
        let events = self
            .sla_repo
            .list_sla_events_for_applied_sla(applied_sla_id)
            .await?;

        let status = applied_sla.aggregate_status(&events);
        if status != applied_sla.status {
            self.sla_repo
                .update_applied_sla_status(applied_sla_id, status)
                .await?;
            info!(
                "Applied SLA {} status changed from {} to {}",
                applied_sla_id, applied_sla.status, status
            );
        }

        Ok((applied_sla, events))
    }

    // ========================================
    // Helper Methods
    // ========================================

    /// Calendar and timezone for a team, falling back to the app-wide settings
    async fn resolve_business_hours(
        &self,
        team_id: Option<&str>,
    ) -> DomainResult<(BusinessHours, String)> {
        let team = match team_id.filter(|id| !id.is_empty()) {
            Some(id) => self.team_repo.get_team_by_id(id).await?,
            None => None,
        };

        let mut business_hours_id = team
            .as_ref()
            .and_then(|t| t.business_hours_id.clone())
            .filter(|id| !id.is_empty());
        let mut timezone = team
            .as_ref()
            .and_then(|t| t.timezone.clone())
            .filter(|tz| !tz.is_empty());

        if business_hours_id.is_none() || timezone.is_none() {
            let settings = self
                .settings_repo
                .get_settings_by_prefix(APP_SETTINGS_PREFIX)
                .await?;
            if business_hours_id.is_none() {
                business_hours_id = setting_string(&settings, APP_BUSINESS_HOURS_KEY);
            }
            if timezone.is_none() {
                timezone = setting_string(&settings, APP_TIMEZONE_KEY);
            }
        }

        let business_hours_id = business_hours_id.ok_or_else(|| {
            DomainError::Configuration(format!(
                "No business hours configured for team {:?} and no {} setting",
                team_id, APP_BUSINESS_HOURS_KEY
            ))
        })?;
        let business_hours = self
            .business_hours_repo
            .get_business_hours(&business_hours_id)
            .await?;

        let timezone = timezone
            .or_else(|| business_hours.timezone.clone().filter(|tz| !tz.is_empty()))
            .ok_or_else(|| {
                DomainError::Configuration(format!(
                    "No timezone configured for team {:?} and no {} setting",
                    team_id, APP_TIMEZONE_KEY
                ))
            })?;

        Ok((business_hours, timezone))
    }
}

/// Budgets are whole minutes; second-level durations round up.
fn budget_minutes(seconds: i64) -> i64 {
    seconds.saturating_add(59) / 60
}

fn setting_string(settings: &serde_json::Value, key: &str) -> Option<String> {
    match settings.get(key)? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_budget_minutes_rounds_up() {
        assert_eq!(budget_minutes(60), 1);
        assert_eq!(budget_minutes(45), 1);
        assert_eq!(budget_minutes(7200), 120);
        assert_eq!(budget_minutes(7201), 121);
    }

    #[test]
    fn test_setting_string() {
        let settings = json!({
            "app.timezone": "Europe/Paris",
            "app.business_hours_id": 7,
            "app.site_name": ""
        });
        assert_eq!(
            setting_string(&settings, "app.timezone"),
            Some("Europe/Paris".to_string())
        );
        assert_eq!(
            setting_string(&settings, "app.business_hours_id"),
            Some("7".to_string())
        );
        assert_eq!(setting_string(&settings, "app.site_name"), None);
        assert_eq!(setting_string(&settings, "app.missing"), None);
    }
}
