use chrono::{DateTime, SecondsFormat, Utc};
use log::LevelFilter;
use sqlx::{
    any::{AnyConnectOptions, AnyPoolOptions, AnyRow},
    AnyPool, ConnectOptions, Row,
};
use std::str::FromStr;

mod agents;
mod business_hours;
mod conversations;
mod settings;
mod sla;
mod teams;
pub mod templates;

pub struct Database {
    pub(crate) pool: AnyPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        // Ensure drivers are installed for AnyPool
        sqlx::any::install_default_drivers();

        let mut connect_options = AnyConnectOptions::from_str(database_url)?;

        connect_options = connect_options
            .log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, std::time::Duration::from_secs(1));

        let pool = AnyPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .connect_with(connect_options)
            .await?;

        // Enable optimizations for SQLite
        if database_url.starts_with("sqlite") {
            sqlx::query("PRAGMA journal_mode = WAL")
                .execute(&pool)
                .await?;
            sqlx::query("PRAGMA busy_timeout = 5000")
                .execute(&pool)
                .await?;
            sqlx::query("PRAGMA synchronous = NORMAL")
                .execute(&pool)
                .await?;
            sqlx::query("PRAGMA foreign_keys = ON")
                .execute(&pool)
                .await?;
        }

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("migrations/sqlite").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

// ========================================
// Column helpers
// ========================================

/// Fixed-width UTC timestamp, so text comparison in SQL is time comparison
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn format_optional_timestamp(at: Option<DateTime<Utc>>) -> Option<String> {
    at.map(format_timestamp)
}

/// Nullable text column. The `Any` driver refuses to decode NULL into
/// `Option<String>` directly, so a failed decode reads as absent.
pub(crate) fn optional_column(row: &AnyRow, name: &str) -> Option<String> {
    row.try_get::<Option<String>, _>(name).ok().flatten()
}

pub(crate) fn optional_timestamp(
    row: &AnyRow,
    name: &str,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    parse_optional_timestamp(optional_column(row, name))
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

pub(crate) fn parse_optional_timestamp(
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| parse_timestamp(&v))
        .transpose()
}

/// Decode a column stored as the `Display` form of an enum
pub(crate) fn parse_enum<T>(value: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = String>,
{
    value.parse().map_err(|e: String| {
        sqlx::Error::Decode(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            e,
        )))
    })
}
