use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Open,
    Snoozed,
    Resolved,
    Closed,
}

impl ConversationStatus {
    /// Resolved and closed conversations no longer need SLA notifications.
    pub fn is_finished(&self) -> bool {
        matches!(self, ConversationStatus::Resolved | ConversationStatus::Closed)
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationStatus::Open => write!(f, "open"),
            ConversationStatus::Snoozed => write!(f, "snoozed"),
            ConversationStatus::Resolved => write!(f, "resolved"),
            ConversationStatus::Closed => write!(f, "closed"),
        }
    }
}

// Convert from string (for SQLx)
impl From<String> for ConversationStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "snoozed" => ConversationStatus::Snoozed,
            "resolved" => ConversationStatus::Resolved,
            "closed" => ConversationStatus::Closed,
            _ => ConversationStatus::Open,
        }
    }
}

/// The slice of a conversation the SLA engine reads.
///
/// `first_response_at` and `resolved_at` are owned by the conversation
/// collaborator; the engine only observes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSlaState {
    pub id: String,
    pub reference_number: i64,
    pub subject: Option<String>,
    pub status: ConversationStatus,
    pub assigned_user_id: Option<String>,
    pub assigned_team_id: Option<String>,
    pub first_response_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub next_sla_deadline_at: Option<DateTime<Utc>>,
}

impl ConversationSlaState {
    pub fn new(reference_number: i64, subject: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            reference_number,
            subject,
            status: ConversationStatus::Open,
            assigned_user_id: None,
            assigned_team_id: None,
            first_response_at: None,
            resolved_at: None,
            next_sla_deadline_at: None,
        }
    }
}
