use super::test_db::{setup_test_db, TestDatabase};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use oxidesk_sla::{
    bootstrap::SlaEngine,
    domain::{
        entities::{
            Agent, BusinessHours, ConversationSlaState, CreateSlaPolicyRequest,
            NotificationDelayKind, NotificationRecipient, NotificationRule, SlaNotificationType,
            SlaPolicy, Team,
        },
        errors::{DomainError, DomainResult},
        ports::{
            notifier::{NotificationMessage, Notifier},
            template_repository::{RenderedTemplate, TemplateRenderer},
            time_service::TimeService,
        },
    },
    infrastructure::persistence::{templates::LocalTemplateRepository, Database},
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Monday to Friday, 09:00 to 17:00
pub const WEEKDAY_HOURS: &str = r#"{
    "Monday": {"open": "09:00", "close": "17:00"},
    "Tuesday": {"open": "09:00", "close": "17:00"},
    "Wednesday": {"open": "09:00", "close": "17:00"},
    "Thursday": {"open": "09:00", "close": "17:00"},
    "Friday": {"open": "09:00", "close": "17:00"},
    "Saturday": {"closed_all_day": true},
    "Sunday": {"closed_all_day": true}
}"#;

pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .unwrap()
}

// ========================================
// Test doubles
// ========================================

/// Clock that only moves when the test says so
pub struct FixedTimeService {
    now: Mutex<DateTime<Utc>>,
}

impl FixedTimeService {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = *now + by;
    }
}

impl TimeService for FixedTimeService {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Notifier that keeps every message it was asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<NotificationMessage>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<NotificationMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: NotificationMessage) -> DomainResult<()> {
        self.sent.lock().unwrap().push(message);
        if self.fail.load(Ordering::SeqCst) {
            return Err(DomainError::Internal("SMTP relay refused".to_string()));
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// Renderer that ignores stored templates: the subject is the template name
/// and the body is the data context as JSON. Can be told to fail.
#[derive(Default)]
pub struct StaticTemplateRenderer {
    fail: AtomicBool,
}

impl StaticTemplateRenderer {
    pub fn failing() -> Self {
        Self {
            fail: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl TemplateRenderer for StaticTemplateRenderer {
    async fn render_stored_template(
        &self,
        name: &str,
        data: &serde_json::Value,
    ) -> DomainResult<RenderedTemplate> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DomainError::NotFound(format!("Template not found: {}", name)));
        }
        Ok(RenderedTemplate {
            subject: name.to_string(),
            body: data.to_string(),
        })
    }
}

// ========================================
// Engine
// ========================================

pub struct TestEngine {
    pub test_db: TestDatabase,
    pub engine: SlaEngine,
    pub clock: Arc<FixedTimeService>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestEngine {
    pub fn db(&self) -> &Database {
        self.test_db.db()
    }
}

/// Engine over a fresh database, rendering the bundled templates, with the
/// clock frozen at `now`
pub async fn setup_engine(now: DateTime<Utc>) -> TestEngine {
    let templates = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("templates");
    setup_engine_with_renderer(now, Arc::new(LocalTemplateRepository::new(templates))).await
}

pub async fn setup_engine_with_renderer(
    now: DateTime<Utc>,
    renderer: Arc<dyn TemplateRenderer>,
) -> TestEngine {
    let test_db = setup_test_db().await;
    let clock = Arc::new(FixedTimeService::new(now));
    let notifier = Arc::new(RecordingNotifier::default());

    let engine = SlaEngine::new(
        test_db.db().clone(),
        renderer,
        notifier.clone() as Arc<dyn Notifier>,
        clock.clone() as Arc<dyn TimeService>,
    );

    TestEngine {
        test_db,
        engine,
        clock,
        notifier,
    }
}

// ========================================
// Fixtures
// ========================================

pub async fn create_business_hours(
    db: &Database,
    hours: &str,
    holidays: &str,
    timezone: Option<&str>,
) -> BusinessHours {
    let business_hours = BusinessHours::new(
        "Office hours".to_string(),
        hours.to_string(),
        holidays.to_string(),
        timezone.map(str::to_string),
    );
    db.create_business_hours(&business_hours)
        .await
        .expect("Failed to create business hours");
    business_hours
}

pub async fn create_always_open_hours(db: &Database) -> BusinessHours {
    let business_hours = BusinessHours::always_open("Around the clock".to_string());
    db.create_business_hours(&business_hours)
        .await
        .expect("Failed to create business hours");
    business_hours
}

/// Make `business_hours` the application-wide calendar
pub async fn set_app_calendar(db: &Database, business_hours_id: &str, timezone: &str) {
    db.upsert_setting("app.business_hours_id", &json!(business_hours_id))
        .await
        .expect("Failed to store business hours setting");
    db.upsert_setting("app.timezone", &json!(timezone))
        .await
        .expect("Failed to store timezone setting");
}

/// Weekday 09:00-17:00 UTC calendar set as the app default
pub async fn setup_weekday_calendar(db: &Database) -> BusinessHours {
    let business_hours = create_business_hours(db, WEEKDAY_HOURS, "[]", Some("UTC")).await;
    set_app_calendar(db, &business_hours.id, "UTC").await;
    business_hours
}

pub async fn create_test_team(
    db: &Database,
    name: &str,
    business_hours_id: Option<&str>,
    timezone: Option<&str>,
) -> Team {
    let mut team = Team::new(name.to_string());
    team.business_hours_id = business_hours_id.map(str::to_string);
    team.timezone = timezone.map(str::to_string);
    db.create_team(&team).await.expect("Failed to create team");
    team
}

pub async fn create_test_agent(db: &Database, email: &str, first_name: &str) -> Agent {
    let agent = Agent::new(email.to_string(), first_name.to_string(), None);
    db.create_agent(&agent).await.expect("Failed to create agent");
    agent
}

pub async fn create_test_conversation(
    db: &Database,
    reference_number: i64,
    assigned_user_id: Option<&str>,
) -> ConversationSlaState {
    let mut conversation =
        ConversationSlaState::new(reference_number, Some("Printer on fire".to_string()));
    conversation.assigned_user_id = assigned_user_id.map(str::to_string);
    db.create_conversation(&conversation)
        .await
        .expect("Failed to create conversation");
    conversation
}

pub async fn create_test_policy(
    engine: &SlaEngine,
    name: &str,
    first_response: &str,
    resolution: &str,
    next_response: &str,
    notifications: Vec<NotificationRule>,
) -> SlaPolicy {
    engine
        .sla_service
        .create_policy(CreateSlaPolicyRequest {
            name: name.to_string(),
            description: Some(format!("Test policy: {}", name)),
            first_response_time: first_response.to_string(),
            resolution_time: resolution.to_string(),
            next_response_time: next_response.to_string(),
            notifications,
        })
        .await
        .expect("Failed to create SLA policy")
}

pub fn warning_rule(delay: &str, recipients: Vec<NotificationRecipient>) -> NotificationRule {
    NotificationRule {
        notification_type: SlaNotificationType::Warning,
        delay_kind: NotificationDelayKind::Delay,
        delay: delay.to_string(),
        recipients,
    }
}

pub fn breach_rule(recipients: Vec<NotificationRecipient>) -> NotificationRule {
    NotificationRule {
        notification_type: SlaNotificationType::Breach,
        delay_kind: NotificationDelayKind::Immediate,
        delay: String::new(),
        recipients,
    }
}
