use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::conversation::ConversationStatus;

// ===== Metrics =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaMetric {
    FirstResponse,
    Resolution,
    NextResponse,
}

impl SlaMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlaMetric::FirstResponse => "first_response",
            SlaMetric::Resolution => "resolution",
            SlaMetric::NextResponse => "next_response",
        }
    }
}

impl std::fmt::Display for SlaMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SlaMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first_response" => Ok(SlaMetric::FirstResponse),
            "resolution" => Ok(SlaMetric::Resolution),
            "next_response" => Ok(SlaMetric::NextResponse),
            _ => Err(format!("Invalid SLA metric: {}", s)),
        }
    }
}

// ===== Notification rules =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlaNotificationType {
    Warning,
    Breach,
}

impl SlaNotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlaNotificationType::Warning => "warning",
            SlaNotificationType::Breach => "breach",
        }
    }
}

impl std::fmt::Display for SlaNotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SlaNotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "warning" => Ok(SlaNotificationType::Warning),
            "breach" => Ok(SlaNotificationType::Breach),
            _ => Err(format!("Invalid SLA notification type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationDelayKind {
    #[default]
    Immediate,
    Delay,
}

/// Who receives a notification. `AssignedUser` is resolved at send time,
/// since the assignee may change after the notification was scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationRecipient {
    Agent(String),
    AssignedUser,
}

pub const ASSIGNED_USER_RECIPIENT: &str = "assigned_user";

impl From<String> for NotificationRecipient {
    fn from(value: String) -> Self {
        if value == ASSIGNED_USER_RECIPIENT {
            NotificationRecipient::AssignedUser
        } else {
            NotificationRecipient::Agent(value)
        }
    }
}

impl From<NotificationRecipient> for String {
    fn from(value: NotificationRecipient) -> Self {
        match value {
            NotificationRecipient::Agent(id) => id,
            NotificationRecipient::AssignedUser => ASSIGNED_USER_RECIPIENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRule {
    #[serde(rename = "type")]
    pub notification_type: SlaNotificationType,
    #[serde(default)]
    pub delay_kind: NotificationDelayKind,
    #[serde(default)]
    pub delay: String, // Format: "10m", "1h"
    pub recipients: Vec<NotificationRecipient>,
}

impl NotificationRule {
    /// Offset from the deadline (warnings) or breach time (breaches)
    pub fn delay(&self) -> Result<Duration, String> {
        match self.delay_kind {
            NotificationDelayKind::Immediate => Ok(Duration::zero()),
            NotificationDelayKind::Delay => parse_duration(&self.delay).map(Duration::seconds),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.recipients.is_empty() {
            return Err("Notification rule must have at least one recipient".to_string());
        }
        if self
            .recipients
            .iter()
            .any(|r| matches!(r, NotificationRecipient::Agent(id) if id.trim().is_empty()))
        {
            return Err("Notification recipient cannot be empty".to_string());
        }
        self.delay().map(|_| ())
    }
}

// ===== SLA Policy =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaPolicy {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub first_response_time: String, // Format: "2h", "30m", "1d"; empty = not tracked
    pub resolution_time: String,     // Format: "24h", "2d"
    pub next_response_time: String,  // Format: "4h", "30m"
    pub notifications: Vec<NotificationRule>,
    pub created_at: String,
    pub updated_at: String,
}

impl SlaPolicy {
    pub fn new(
        name: String,
        description: Option<String>,
        first_response_time: String,
        resolution_time: String,
        next_response_time: String,
        notifications: Vec<NotificationRule>,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            description,
            first_response_time,
            resolution_time,
            next_response_time,
            notifications,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn duration_for(&self, metric: SlaMetric) -> &str {
        match metric {
            SlaMetric::FirstResponse => &self.first_response_time,
            SlaMetric::Resolution => &self.resolution_time,
            SlaMetric::NextResponse => &self.next_response_time,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("SLA policy name cannot be empty".to_string());
        }
        for metric in [
            SlaMetric::FirstResponse,
            SlaMetric::Resolution,
            SlaMetric::NextResponse,
        ] {
            parse_optional_duration(self.duration_for(metric))
                .map_err(|e| format!("Invalid {}_time: {}", metric, e))?;
        }
        for rule in &self.notifications {
            rule.validate()
                .map_err(|e| format!("Invalid notification rule: {}", e))?;
        }
        Ok(())
    }
}

// ===== Deadlines / breaches per metric =====

/// One optional timestamp per metric. `None` means the metric is not tracked
/// (or not relevant to the call) and is skipped everywhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricTimestamps {
    pub first_response: Option<DateTime<Utc>>,
    pub resolution: Option<DateTime<Utc>>,
    pub next_response: Option<DateTime<Utc>>,
}

pub type SlaDeadlines = MetricTimestamps;
pub type SlaBreaches = MetricTimestamps;

impl MetricTimestamps {
    pub fn only(metric: SlaMetric, at: DateTime<Utc>) -> Self {
        let mut timestamps = Self::default();
        timestamps.set(metric, Some(at));
        timestamps
    }

    pub fn get(&self, metric: SlaMetric) -> Option<DateTime<Utc>> {
        match metric {
            SlaMetric::FirstResponse => self.first_response,
            SlaMetric::Resolution => self.resolution,
            SlaMetric::NextResponse => self.next_response,
        }
    }

    pub fn set(&mut self, metric: SlaMetric, at: Option<DateTime<Utc>>) {
        match metric {
            SlaMetric::FirstResponse => self.first_response = at,
            SlaMetric::Resolution => self.resolution = at,
            SlaMetric::NextResponse => self.next_response = at,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlaMetric, DateTime<Utc>)> + '_ {
        [
            SlaMetric::FirstResponse,
            SlaMetric::Resolution,
            SlaMetric::NextResponse,
        ]
        .into_iter()
        .filter_map(|metric| self.get(metric).map(|at| (metric, at)))
    }

    pub fn earliest(&self) -> Option<DateTime<Utc>> {
        self.iter().map(|(_, at)| at).min()
    }
}

// ===== Applied SLA =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedSla {
    pub id: String,
    pub conversation_id: String,
    pub sla_policy_id: String,
    pub status: AppliedSlaStatus,
    pub first_response_deadline_at: Option<DateTime<Utc>>,
    pub resolution_deadline_at: Option<DateTime<Utc>>,
    pub first_response_met_at: Option<DateTime<Utc>>,
    pub first_response_breached_at: Option<DateTime<Utc>>,
    pub resolution_met_at: Option<DateTime<Utc>>,
    pub resolution_breached_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    // Read-only view of the conversation, filled in by the store on reads
    pub conversation_first_response_at: Option<DateTime<Utc>>,
    pub conversation_resolved_at: Option<DateTime<Utc>>,
    pub conversation_status: Option<ConversationStatus>,
}

/// Everything the evaluator needs to decide one metric of an applied SLA
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricState {
    pub deadline: Option<DateTime<Utc>>,
    pub met_at: Option<DateTime<Utc>>,
    pub breached_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl MetricState {
    pub fn is_terminal(&self) -> bool {
        self.met_at.is_some() || self.breached_at.is_some()
    }

    /// Met, or completed in time but not yet evaluated
    pub fn is_met(&self) -> bool {
        self.met_at.is_some()
            || matches!(
                (self.completed_at, self.deadline),
                (Some(completed), Some(deadline)) if completed <= deadline
            )
    }
}

impl AppliedSla {
    pub fn new(
        conversation_id: String,
        sla_policy_id: String,
        first_response_deadline_at: Option<DateTime<Utc>>,
        resolution_deadline_at: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id,
            sla_policy_id,
            status: AppliedSlaStatus::Pending,
            first_response_deadline_at,
            resolution_deadline_at,
            first_response_met_at: None,
            first_response_breached_at: None,
            resolution_met_at: None,
            resolution_breached_at: None,
            created_at: now,
            updated_at: now,
            conversation_first_response_at: None,
            conversation_resolved_at: None,
            conversation_status: None,
        }
    }

    /// State of first response or resolution. Next response lives on SLA events.
    pub fn metric_state(&self, metric: SlaMetric) -> Option<MetricState> {
        match metric {
            SlaMetric::FirstResponse => Some(MetricState {
                deadline: self.first_response_deadline_at,
                met_at: self.first_response_met_at,
                breached_at: self.first_response_breached_at,
                completed_at: self.conversation_first_response_at,
            }),
            SlaMetric::Resolution => Some(MetricState {
                deadline: self.resolution_deadline_at,
                met_at: self.resolution_met_at,
                breached_at: self.resolution_breached_at,
                completed_at: self.conversation_resolved_at,
            }),
            SlaMetric::NextResponse => None,
        }
    }

    pub fn deadlines(&self) -> SlaDeadlines {
        SlaDeadlines {
            first_response: self.first_response_deadline_at,
            resolution: self.resolution_deadline_at,
            next_response: None,
        }
    }

    /// Deadlines of metrics that are tracked and not yet met or breached
    pub fn open_deadlines(&self) -> SlaDeadlines {
        let mut open = SlaDeadlines::default();
        for metric in [SlaMetric::FirstResponse, SlaMetric::Resolution] {
            if let Some(state) = self.metric_state(metric) {
                if !state.is_terminal() {
                    open.set(metric, state.deadline);
                }
            }
        }
        open
    }

    /// Worst outcome over both metrics and all next-response events:
    /// breached > pending > met, with partially_met for a mix of met and pending.
    pub fn aggregate_status(&self, events: &[SlaEvent]) -> AppliedSlaStatus {
        let mut outcomes = Vec::new();
        for metric in [SlaMetric::FirstResponse, SlaMetric::Resolution] {
            if let Some(state) = self.metric_state(metric) {
                if state.deadline.is_none() {
                    continue;
                }
                outcomes.push(if state.breached_at.is_some() {
                    SlaEventStatus::Breached
                } else if state.met_at.is_some() {
                    SlaEventStatus::Met
                } else {
                    SlaEventStatus::Pending
                });
            }
        }
        outcomes.extend(events.iter().map(|e| e.status));

        let has_breached = outcomes.contains(&SlaEventStatus::Breached);
        let has_pending = outcomes.contains(&SlaEventStatus::Pending);
        let has_met = outcomes.contains(&SlaEventStatus::Met);

        if has_breached {
            AppliedSlaStatus::Breached
        } else if !has_pending {
            AppliedSlaStatus::Met
        } else if has_met {
            AppliedSlaStatus::PartiallyMet
        } else {
            AppliedSlaStatus::Pending
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliedSlaStatus {
    Pending,
    PartiallyMet,
    Met,
    Breached,
}

impl std::fmt::Display for AppliedSlaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppliedSlaStatus::Pending => write!(f, "pending"),
            AppliedSlaStatus::PartiallyMet => write!(f, "partially_met"),
            AppliedSlaStatus::Met => write!(f, "met"),
            AppliedSlaStatus::Breached => write!(f, "breached"),
        }
    }
}

impl std::str::FromStr for AppliedSlaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(AppliedSlaStatus::Pending),
            "partially_met" => Ok(AppliedSlaStatus::PartiallyMet),
            "met" => Ok(AppliedSlaStatus::Met),
            "breached" => Ok(AppliedSlaStatus::Breached),
            _ => Err(format!("Invalid applied SLA status: {}", s)),
        }
    }
}

// ===== SLA Event =====

/// One recurring obligation (next response) of an applied SLA.
///
/// `met_at` is written when the reply happens; the evaluator later decides
/// whether that reply met or breached the deadline and moves `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaEvent {
    pub id: String,
    pub applied_sla_id: String,
    pub sla_policy_id: String,
    pub metric: SlaMetric,
    pub status: SlaEventStatus,
    pub deadline_at: DateTime<Utc>,
    pub met_at: Option<DateTime<Utc>>,
    pub breached_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SlaEvent {
    pub fn new(
        applied_sla_id: String,
        sla_policy_id: String,
        metric: SlaMetric,
        deadline_at: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            applied_sla_id,
            sla_policy_id,
            metric,
            status: SlaEventStatus::Pending,
            deadline_at,
            met_at: None,
            breached_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Neither met nor breached. At most one open event exists per applied SLA.
    pub fn is_open(&self) -> bool {
        self.met_at.is_none() && self.breached_at.is_none()
    }
    /// Met, or answered in time but not yet evaluated
    pub fn is_met(&self) -> bool {
        self.status == SlaEventStatus::Met
            || self.met_at.is_some_and(|met_at| met_at <= self.deadline_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlaEventStatus {
    Pending,
    Met,
    Breached,
}

impl std::fmt::Display for SlaEventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlaEventStatus::Pending => write!(f, "pending"),
            SlaEventStatus::Met => write!(f, "met"),
            SlaEventStatus::Breached => write!(f, "breached"),
        }
    }
}

impl std::str::FromStr for SlaEventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SlaEventStatus::Pending),
            "met" => Ok(SlaEventStatus::Met),
            "breached" => Ok(SlaEventStatus::Breached),
            _ => Err(format!("Invalid SLA event status: {}", s)),
        }
    }
}

/// Result of asking for a new next-response event. Only `Created` did work;
/// the other two are benign and must not be treated as failures.
#[derive(Debug, Clone)]
pub enum NextResponseOutcome {
    Created(SlaEvent),
    AlreadyExists,
    NotConfigured,
}

// ===== Scheduled notification =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledSlaNotification {
    pub id: String,
    pub applied_sla_id: String,
    pub sla_event_id: Option<String>,
    pub metric: SlaMetric,
    pub notification_type: SlaNotificationType,
    pub recipients: Vec<NotificationRecipient>,
    pub send_at: DateTime<Utc>,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ScheduledSlaNotification {
    pub fn new(
        applied_sla_id: String,
        sla_event_id: Option<String>,
        metric: SlaMetric,
        notification_type: SlaNotificationType,
        recipients: Vec<NotificationRecipient>,
        send_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            applied_sla_id,
            sla_event_id,
            metric,
            notification_type,
            recipients,
            send_at,
            processed: false,
            processed_at: None,
            created_at: Utc::now(),
        }
    }
}

// ===== Duration Parsing Utility =====

/// Parse duration string like "2h", "30m", "1d" or "1h30m" into seconds
pub fn parse_duration(duration_str: &str) -> Result<i64, String> {
    static FORMAT_REGEX: OnceLock<Regex> = OnceLock::new();
    static PART_REGEX: OnceLock<Regex> = OnceLock::new();
    let format = FORMAT_REGEX
        .get_or_init(|| Regex::new(r"^(\d+[dhms])+$").expect("Invalid duration regex"));
    let part =
        PART_REGEX.get_or_init(|| Regex::new(r"(\d+)([dhms])").expect("Invalid duration regex"));

    let trimmed = duration_str.trim();
    if !format.is_match(trimmed) {
        return Err(format!(
            "Invalid duration format: {}. Expected format: <number><d|h|m|s>, e.g. 1h30m",
            duration_str
        ));
    }

    let mut seconds: i64 = 0;
    for caps in part.captures_iter(trimmed) {
        let number: i64 = caps[1]
            .parse()
            .map_err(|_| format!("Invalid number in duration: {}", &caps[1]))?;
        let unit_seconds = match &caps[2] {
            "s" => 1,
            "m" => 60,
            "h" => 60 * 60,
            "d" => 60 * 60 * 24,
            unit => return Err(format!("Invalid duration unit: {}", unit)),
        };
        seconds = number
            .checked_mul(unit_seconds)
            .and_then(|s| seconds.checked_add(s))
            .ok_or_else(|| format!("Duration too large: {}", duration_str))?;
    }

    if seconds <= 0 {
        return Err("Duration must be greater than 0".to_string());
    }

    Ok(seconds)
}

/// Like [`parse_duration`], but an empty string means "not tracked"
pub fn parse_optional_duration(duration_str: &str) -> Result<Option<i64>, String> {
    if duration_str.trim().is_empty() {
        return Ok(None);
    }
    parse_duration(duration_str).map(Some)
}

// ===== DTOs =====

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSlaPolicyRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub first_response_time: String,
    #[serde(default)]
    pub resolution_time: String,
    #[serde(default)]
    pub next_response_time: String,
    #[serde(default)]
    pub notifications: Vec<NotificationRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSlaPolicyRequest {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub first_response_time: Option<String>,
    pub resolution_time: Option<String>,
    pub next_response_time: Option<String>,
    pub notifications: Option<Vec<NotificationRule>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("2h").unwrap(), 7200);
        assert_eq!(parse_duration("30m").unwrap(), 1800);
        assert_eq!(parse_duration("1d").unwrap(), 86400);
        assert_eq!(parse_duration("45s").unwrap(), 45);
    }

    #[test]
    fn test_parse_duration_compound() {
        assert_eq!(parse_duration("1h30m").unwrap(), 5400);
        assert_eq!(parse_duration("1d2h").unwrap(), 93600);
    }

    #[test]
    fn test_parse_duration_invalid_format() {
        assert!(parse_duration("2x").is_err());
        assert!(parse_duration("h2").is_err());
        assert!(parse_duration("two hours").is_err());
        assert!(parse_duration("").is_err());
        assert!(parse_duration("0h").is_err());
    }

    #[test]
    fn test_parse_optional_duration_empty_is_untracked() {
        assert_eq!(parse_optional_duration("").unwrap(), None);
        assert_eq!(parse_optional_duration("   ").unwrap(), None);
        assert_eq!(parse_optional_duration("4h").unwrap(), Some(14400));
    }

    #[test]
    fn test_recipient_round_trips_through_string() {
        let parsed: Vec<NotificationRecipient> =
            serde_json::from_str(r#"["assigned_user", "agent-1"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                NotificationRecipient::AssignedUser,
                NotificationRecipient::Agent("agent-1".to_string())
            ]
        );
        assert_eq!(
            serde_json::to_string(&parsed).unwrap(),
            r#"["assigned_user","agent-1"]"#
        );
    }

    #[test]
    fn test_notification_rule_delay() {
        let immediate = NotificationRule {
            notification_type: SlaNotificationType::Breach,
            delay_kind: NotificationDelayKind::Immediate,
            delay: "garbage".to_string(),
            recipients: vec![NotificationRecipient::AssignedUser],
        };
        assert_eq!(immediate.delay().unwrap(), Duration::zero());

        let delayed = NotificationRule {
            delay_kind: NotificationDelayKind::Delay,
            delay: "15m".to_string(),
            ..immediate.clone()
        };
        assert_eq!(delayed.delay().unwrap(), Duration::minutes(15));

        let no_recipients = NotificationRule {
            recipients: vec![],
            ..delayed
        };
        assert!(no_recipients.validate().is_err());
    }

    #[test]
    fn test_policy_validation_rejects_bad_durations() {
        let policy = SlaPolicy::new(
            "Broken".to_string(),
            None,
            "2 hours".to_string(),
            "".to_string(),
            "".to_string(),
            vec![],
        );
        assert!(policy.validate().is_err());

        let policy = SlaPolicy::new(
            "Fine".to_string(),
            None,
            "2h".to_string(),
            "".to_string(),
            "30m".to_string(),
            vec![],
        );
        assert!(policy.validate().is_ok());
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_aggregate_status() {
        let mut applied = AppliedSla::new(
            "conv".to_string(),
            "policy".to_string(),
            Some(at(10)),
            Some(at(18)),
        );
        assert_eq!(applied.aggregate_status(&[]), AppliedSlaStatus::Pending);

        applied.first_response_met_at = Some(at(9));
        assert_eq!(applied.aggregate_status(&[]), AppliedSlaStatus::PartiallyMet);

        applied.resolution_met_at = Some(at(12));
        assert_eq!(applied.aggregate_status(&[]), AppliedSlaStatus::Met);

        let mut event = SlaEvent::new(
            applied.id.clone(),
            "policy".to_string(),
            SlaMetric::NextResponse,
            at(13),
        );
        event.status = SlaEventStatus::Breached;
        event.breached_at = Some(at(14));
        assert_eq!(
            applied.aggregate_status(&[event]),
            AppliedSlaStatus::Breached
        );
    }

    #[test]
    fn test_in_time_completion_counts_as_met_before_evaluation() {
        let mut applied = AppliedSla::new(
            "conv".to_string(),
            "policy".to_string(),
            Some(at(10)),
            None,
        );
        let state = |applied: &AppliedSla| applied.metric_state(SlaMetric::FirstResponse).unwrap();
        assert!(!state(&applied).is_met());

        applied.conversation_first_response_at = Some(at(11));
        assert!(!state(&applied).is_met());

        applied.conversation_first_response_at = Some(at(10));
        assert!(state(&applied).is_met());

        let mut event = SlaEvent::new(
            "applied".to_string(),
            "policy".to_string(),
            SlaMetric::NextResponse,
            at(13),
        );
        assert!(!event.is_met());
        event.met_at = Some(at(14));
        assert!(!event.is_met());
        event.met_at = Some(at(12));
        assert!(event.is_met());
        assert_eq!(event.status, SlaEventStatus::Pending);
    }

    #[test]
    fn test_untracked_metric_is_ignored_by_aggregate() {
        let mut applied =
            AppliedSla::new("conv".to_string(), "policy".to_string(), Some(at(10)), None);
        applied.first_response_met_at = Some(at(9));
        assert_eq!(applied.aggregate_status(&[]), AppliedSlaStatus::Met);
        assert_eq!(applied.open_deadlines().earliest(), None);
    }

    #[test]
    fn test_metric_timestamps_iterate_only_set_values() {
        let timestamps = MetricTimestamps::only(SlaMetric::Resolution, at(12));
        let collected: Vec<_> = timestamps.iter().collect();
        assert_eq!(collected, vec![(SlaMetric::Resolution, at(12))]);
    }
}
