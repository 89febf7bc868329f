pub mod sla_notification_dispatcher;
pub mod sla_notification_scheduler;
pub mod sla_service;

pub use sla_notification_dispatcher::SlaNotificationDispatcher;
pub use sla_notification_scheduler::SlaNotificationScheduler;
pub use sla_service::SlaService;
