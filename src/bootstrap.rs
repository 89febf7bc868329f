use crate::application::services::{SlaNotificationDispatcher, SlaNotificationScheduler, SlaService};
use crate::config::Config;
use crate::domain::errors::DomainResult;
use crate::domain::ports::agent_repository::AgentRepository;
use crate::domain::ports::business_hours_repository::BusinessHoursRepository;
use crate::domain::ports::conversation_repository::ConversationRepository;
use crate::domain::ports::notifier::Notifier;
use crate::domain::ports::settings_repository::SettingsRepository;
use crate::domain::ports::sla_repository::SlaRepository;
use crate::domain::ports::team_repository::TeamRepository;
use crate::domain::ports::template_repository::TemplateRenderer;
use crate::domain::ports::time_service::TimeService;
use crate::infrastructure::persistence::templates::LocalTemplateRepository;
use crate::infrastructure::persistence::Database;
use crate::infrastructure::providers::{LogNotifier, SmtpNotifier};
use crate::infrastructure::runtime::TokioTimeService;
use crate::infrastructure::workers::spawn_sla_workers;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The wired SLA services
#[derive(Clone)]
pub struct SlaEngine {
    pub sla_service: SlaService,
    pub scheduler: SlaNotificationScheduler,
    pub dispatcher: SlaNotificationDispatcher,
}

impl SlaEngine {
    /// Wire every service against one database and the given outbound adapters
    pub fn new(
        db: Database,
        renderer: Arc<dyn TemplateRenderer>,
        notifier: Arc<dyn Notifier>,
        time_service: Arc<dyn TimeService>,
    ) -> Self {
        let sla_repo = Arc::new(db.clone()) as Arc<dyn SlaRepository>;
        let conversation_repo = Arc::new(db.clone()) as Arc<dyn ConversationRepository>;

        let scheduler = SlaNotificationScheduler::new(sla_repo.clone(), time_service.clone());

        let sla_service = SlaService::new(
            sla_repo.clone(),
            Arc::new(db.clone()) as Arc<dyn TeamRepository>,
            Arc::new(db.clone()) as Arc<dyn BusinessHoursRepository>,
            Arc::new(db.clone()) as Arc<dyn SettingsRepository>,
            conversation_repo.clone(),
            scheduler.clone(),
            time_service.clone(),
        );
        tracing::info!("SLA service initialized");

        let dispatcher = SlaNotificationDispatcher::new(
            sla_repo,
            conversation_repo,
            Arc::new(db) as Arc<dyn AgentRepository>,
            renderer,
            notifier,
            time_service,
        );
        tracing::info!("SLA notification dispatcher initialized");

        Self {
            sla_service,
            scheduler,
            dispatcher,
        }
    }

    /// Start the evaluation and dispatch loops
    pub fn start_workers(&self, config: &Config, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        spawn_sla_workers(
            self.sla_service.clone(),
            self.dispatcher.clone(),
            config.worker_config(),
            cancel,
        )
    }
}

/// SMTP when a host is configured, otherwise log-only
pub fn build_notifier(config: &Config) -> DomainResult<Arc<dyn Notifier>> {
    match &config.smtp {
        Some(smtp) => {
            tracing::info!("SMTP notifier configured for {}:{}", smtp.host, smtp.port);
            Ok(Arc::new(SmtpNotifier::new(smtp)?))
        }
        None => {
            tracing::warn!("SMTP_HOST not set, SLA notifications will only be logged");
            Ok(Arc::new(LogNotifier::new()))
        }
    }
}

pub fn build_sla_engine(db: Database, config: &Config) -> DomainResult<SlaEngine> {
    let renderer = Arc::new(LocalTemplateRepository::new(config.template_dir.clone()))
        as Arc<dyn TemplateRenderer>;
    let notifier = build_notifier(config)?;
    let time_service = Arc::new(TokioTimeService::new()) as Arc<dyn TimeService>;

    Ok(SlaEngine::new(db, renderer, notifier, time_service))
}
