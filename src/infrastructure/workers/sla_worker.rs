//! Periodic SLA background tasks.
//!
//! Three independent loops share one cancellation token and nothing else:
//! applied-SLA evaluation, SLA-event evaluation and notification dispatch.
//! Each loop checks the token on every tick, and the services check it again
//! between items, so shutdown waits for at most one item.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::application::services::{SlaNotificationDispatcher, SlaService};

/// Tick intervals of the SLA loops.
#[derive(Debug, Clone)]
pub struct SlaWorkerConfig {
    pub evaluation_interval: Duration,
    pub event_evaluation_interval: Duration,
    pub notification_interval: Duration,
}

impl Default for SlaWorkerConfig {
    fn default() -> Self {
        Self {
            evaluation_interval: Duration::from_secs(60),
            event_evaluation_interval: Duration::from_secs(60),
            notification_interval: Duration::from_secs(30),
        }
    }
}

/// Spawn all three SLA loops. Cancel `cancel` and await the handles to stop them.
pub fn spawn_sla_workers(
    sla_service: SlaService,
    dispatcher: SlaNotificationDispatcher,
    config: SlaWorkerConfig,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    vec![
        spawn_sla_evaluation_worker(sla_service.clone(), config.evaluation_interval, cancel.clone()),
        spawn_sla_event_evaluation_worker(sla_service, config.event_evaluation_interval, cancel.clone()),
        spawn_sla_notification_worker(dispatcher, config.notification_interval, cancel),
    ]
}

pub fn spawn_sla_evaluation_worker(
    sla_service: SlaService,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let token = cancel.clone();
        run_periodic("SLA evaluation", every, cancel, || {
            let sla_service = sla_service.clone();
            let token = token.clone();
            async move {
                match sla_service.evaluate_pending_slas(&token).await {
                    Ok(0) => {}
                    Ok(count) => debug!("Evaluated {} applied SLAs", count),
                    Err(e) => error!("Failed to list pending applied SLAs: {}", e),
                }
            }
        })
        .await;
    })
}

pub fn spawn_sla_event_evaluation_worker(
    sla_service: SlaService,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let token = cancel.clone();
        run_periodic("SLA event evaluation", every, cancel, || {
            let sla_service = sla_service.clone();
            let token = token.clone();
            async move {
                match sla_service.evaluate_pending_events(&token).await {
                    Ok(0) => {}
                    Ok(count) => debug!("Evaluated {} SLA events", count),
                    Err(e) => error!("Failed to list pending SLA events: {}", e),
                }
            }
        })
        .await;
    })
}

pub fn spawn_sla_notification_worker(
    dispatcher: SlaNotificationDispatcher,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let token = cancel.clone();
        run_periodic("SLA notification dispatch", every, cancel, || {
            let dispatcher = dispatcher.clone();
            let token = token.clone();
            async move {
                match dispatcher.send_due_notifications(&token).await {
                    Ok(0) => {}
                    Ok(count) => debug!("Processed {} SLA notifications", count),
                    Err(e) => error!("Failed to list due SLA notifications: {}", e),
                }
            }
        })
        .await;
    })
}

async fn run_periodic<F, Fut>(name: &'static str, every: Duration, cancel: CancellationToken, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(interval_secs = every.as_secs(), "{} worker started", name);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("{} worker shutting down", name);
                break;
            }
            _ = ticker.tick() => {
                tick().await;
            }
        }
    }
}
