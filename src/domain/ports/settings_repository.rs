use crate::domain::errors::DomainResult;

/// Application settings keyed like "app.timezone"
#[async_trait::async_trait]
pub trait SettingsRepository: Send + Sync {
    /// JSON object of every setting whose key starts with `prefix`
    async fn get_settings_by_prefix(&self, prefix: &str) -> DomainResult<serde_json::Value>;
}
