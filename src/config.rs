use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::infrastructure::workers::SlaWorkerConfig;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub evaluation_interval_secs: u64,
    pub event_evaluation_interval_secs: u64,
    pub notification_interval_secs: u64,
    pub template_dir: PathBuf,
    /// `None` when no SMTP host is configured; notifications are only logged
    pub smtp: Option<SmtpConfig>,
    pub otel_exporter_endpoint: Option<String>,
    pub service_name: String,
    /// 0 disables the Prometheus exporter
    pub metrics_port: u16,
}

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub use_tls: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database_url =
            var("DATABASE_URL").unwrap_or_else(|| "sqlite://oxidesk_sla.db?mode=rwc".to_string());

        let evaluation_interval_secs = parse_interval(&var, "SLA_EVALUATION_INTERVAL_SECS", 60)?;
        let event_evaluation_interval_secs =
            parse_interval(&var, "SLA_EVENT_EVALUATION_INTERVAL_SECS", 60)?;
        let notification_interval_secs =
            parse_interval(&var, "SLA_NOTIFICATION_INTERVAL_SECS", 30)?;

        let template_dir = PathBuf::from(var("TEMPLATE_DIR").unwrap_or_else(|| "./templates".to_string()));

        let smtp = match var("SMTP_HOST") {
            Some(host) => {
                let port = match var("SMTP_PORT") {
                    Some(port) => port
                        .trim()
                        .parse()
                        .map_err(|_| ConfigError::InvalidPort("SMTP_PORT".to_string()))?,
                    None => 587,
                };
                let use_tls = match var("SMTP_USE_TLS") {
                    Some(value) => parse_bool(&value)
                        .ok_or_else(|| ConfigError::InvalidBool("SMTP_USE_TLS".to_string()))?,
                    None => true,
                };
                Some(SmtpConfig {
                    host,
                    port,
                    username: var("SMTP_USERNAME").unwrap_or_default(),
                    password: var("SMTP_PASSWORD").unwrap_or_default(),
                    from: var("SMTP_FROM").ok_or(ConfigError::MissingSmtpFrom)?,
                    use_tls,
                })
            }
            None => None,
        };

        let otel_exporter_endpoint = var("OTEL_EXPORTER_OTLP_ENDPOINT");

        let service_name = var("SERVICE_NAME").unwrap_or_else(|| "oxidesk-sla".to_string());

        let metrics_port = match var("METRICS_PORT") {
            Some(port) => port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort("METRICS_PORT".to_string()))?,
            None => 9000,
        };

        Ok(Config {
            database_url,
            evaluation_interval_secs,
            event_evaluation_interval_secs,
            notification_interval_secs,
            template_dir,
            smtp,
            otel_exporter_endpoint,
            service_name,
            metrics_port,
        })
    }

    pub fn worker_config(&self) -> SlaWorkerConfig {
        SlaWorkerConfig {
            evaluation_interval: Duration::from_secs(self.evaluation_interval_secs),
            event_evaluation_interval: Duration::from_secs(self.event_evaluation_interval_secs),
            notification_interval: Duration::from_secs(self.notification_interval_secs),
        }
    }
}

fn parse_interval<F>(var: &F, key: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(value) => match value.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(secs),
            _ => Err(ConfigError::InvalidInterval(key.to_string())),
        },
        None => Ok(default),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be a positive number of seconds")]
    InvalidInterval(String),

    #[error("Invalid port number in {0}")]
    InvalidPort(String),

    #[error("{0} must be true or false")]
    InvalidBool(String),

    #[error("SMTP_FROM environment variable not set while SMTP_HOST is")]
    MissingSmtpFrom,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.database_url, "sqlite://oxidesk_sla.db?mode=rwc");
        assert_eq!(config.evaluation_interval_secs, 60);
        assert_eq!(config.event_evaluation_interval_secs, 60);
        assert_eq!(config.notification_interval_secs, 30);
        assert_eq!(config.template_dir, PathBuf::from("./templates"));
        assert!(config.smtp.is_none());
        assert!(config.otel_exporter_endpoint.is_none());
        assert_eq!(config.service_name, "oxidesk-sla");
        assert_eq!(config.metrics_port, 9000);
        assert_eq!(
            config.worker_config().notification_interval,
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_invalid_interval() {
        assert!(matches!(
            config_from(&[("SLA_EVALUATION_INTERVAL_SECS", "0")]),
            Err(ConfigError::InvalidInterval(_))
        ));
        assert!(matches!(
            config_from(&[("SLA_NOTIFICATION_INTERVAL_SECS", "soon")]),
            Err(ConfigError::InvalidInterval(_))
        ));
    }

    #[test]
    fn test_smtp_requires_from() {
        assert!(matches!(
            config_from(&[("SMTP_HOST", "smtp.example.com")]),
            Err(ConfigError::MissingSmtpFrom)
        ));

        let config = config_from(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_FROM", "sla@example.com"),
            ("SMTP_PORT", "2525"),
            ("SMTP_USE_TLS", "false"),
        ])
        .unwrap();
        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.port, 2525);
        assert!(!smtp.use_tls);
        assert_eq!(smtp.username, "");
    }

    #[test]
    fn test_metrics_port_zero_is_allowed() {
        let config = config_from(&[("METRICS_PORT", "0")]).unwrap();
        assert_eq!(config.metrics_port, 0);
    }
}
