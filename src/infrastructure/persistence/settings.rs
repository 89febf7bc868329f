use crate::domain::errors::DomainResult;
use crate::domain::ports::settings_repository::SettingsRepository;
use crate::infrastructure::persistence::{format_timestamp, Database};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::Row;

impl Database {
    /// Insert or replace a setting. `value` is stored as JSON text.
    pub async fn upsert_setting(&self, key: &str, value: &Value) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO settings (key, value, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(serde_json::to_string(value)?)
        .bind(format_timestamp(chrono::Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SettingsRepository for Database {
    async fn get_settings_by_prefix(&self, prefix: &str) -> DomainResult<Value> {
        let rows = sqlx::query("SELECT key, value FROM settings WHERE key LIKE ? ORDER BY key")
            .bind(format!("{}.%", prefix))
            .fetch_all(&self.pool)
            .await?;

        let mut settings = Map::new();
        for row in rows {
            let key: String = row.try_get("key")?;
            let raw: String = row.try_get("value")?;
            // Values written by hand may be bare strings rather than JSON
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            settings.insert(key, value);
        }

        Ok(Value::Object(settings))
    }
}
