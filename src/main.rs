use oxidesk_sla::bootstrap;
use oxidesk_sla::config::Config;
use oxidesk_sla::infrastructure::observability;
use oxidesk_sla::infrastructure::persistence::Database;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    let _observability = observability::init(&config)?;
    tracing::info!("Configuration loaded");

    // Initialize database connection
    let db = Database::connect(&config.database_url).await?;
    tracing::info!("Database connection established");

    // Run migrations
    db.run_migrations().await?;
    tracing::info!("Database migrations applied");

    let engine = bootstrap::build_sla_engine(db, &config)?;

    let cancel = CancellationToken::new();
    let handles = engine.start_workers(&config, cancel.clone());
    tracing::info!("SLA workers started");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping SLA workers");
    cancel.cancel();

    for result in futures::future::join_all(handles).await {
        if let Err(e) = result {
            tracing::error!("SLA worker terminated abnormally: {}", e);
        }
    }

    tracing::info!("SLA workers stopped");
    Ok(())
}
