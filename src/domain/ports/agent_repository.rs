use crate::domain::entities::Agent;
use crate::domain::errors::DomainResult;
use async_trait::async_trait;

#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn get_agent(&self, id: &str) -> DomainResult<Option<Agent>>;
}
