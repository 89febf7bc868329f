use crate::domain::errors::DomainResult;
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct RenderedTemplate {
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait TemplateRenderer: Send + Sync {
    /// Render a stored template by name with a JSON data context
    async fn render_stored_template(
        &self,
        name: &str,
        data: &serde_json::Value,
    ) -> DomainResult<RenderedTemplate>;
}
