use crate::config::Config;
use opentelemetry::{global, trace::TraceError, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use std::net::{Ipv4Addr, SocketAddr};
use thiserror::Error;
use tracing_subscriber::{
    layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter, Registry,
};

const DEFAULT_LOG_FILTER: &str = "oxidesk_sla=debug,sqlx=warn";

/// Counters emitted by the SLA services, with their help text
pub const SLA_COUNTERS: [(&str, &str); 5] = [
    ("sla_breaches_total", "SLA metrics marked breached, by metric"),
    ("sla_met_total", "SLA metrics marked met, by metric"),
    (
        "sla_notifications_scheduled_total",
        "SLA notifications persisted for later dispatch, by type",
    ),
    (
        "sla_notifications_sent_total",
        "SLA notifications handed to the transport, by type",
    ),
    (
        "sla_notifications_failed_total",
        "SLA notification failures, by stage",
    ),
];

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("Failed to install OTLP tracer: {0}")]
    Tracer(#[from] TraceError),

    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),

    #[error("Failed to start Prometheus exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

/// Flushes the OTLP pipeline when dropped
pub struct ObservabilityGuard;

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        shutdown();
    }
}

pub fn init(config: &Config) -> Result<ObservabilityGuard, ObservabilityError> {
    init_tracing(config)?;
    init_metrics(config)?;
    Ok(ObservabilityGuard)
}

fn init_tracing(config: &Config) -> Result<(), ObservabilityError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_thread_ids(true)
        .with_target(true);

    let otel_layer = match &config.otel_exporter_endpoint {
        Some(endpoint) => {
            let tracer = otlp_tracer(endpoint, &config.service_name)?;
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    if let Some(endpoint) = &config.otel_exporter_endpoint {
        tracing::info!("Exporting SLA engine traces to {}", endpoint);
    }
    Ok(())
}

fn otlp_tracer(endpoint: &str, service_name: &str) -> Result<sdktrace::Tracer, TraceError> {
    let resource = Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ]);

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .with_trace_config(sdktrace::config().with_resource(resource))
        .install_batch(runtime::Tokio)
}

fn init_metrics(config: &Config) -> Result<(), ObservabilityError> {
    let Some(addr) = metrics_listen_addr(config.metrics_port) else {
        tracing::info!("Prometheus exporter disabled (METRICS_PORT=0)");
        return Ok(());
    };

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    for (name, help) in SLA_COUNTERS {
        metrics::describe_counter!(name, help);
    }

    tracing::info!("Prometheus exporter listening on {}", addr);
    Ok(())
}

/// Port 0 disables the exporter
fn metrics_listen_addr(port: u16) -> Option<SocketAddr> {
    (port != 0).then(|| SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
}

pub fn shutdown() {
    global::shutdown_tracer_provider();
}
