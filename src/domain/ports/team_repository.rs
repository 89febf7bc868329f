use crate::domain::entities::Team;
use crate::domain::errors::DomainResult;

#[async_trait::async_trait]
pub trait TeamRepository: Send + Sync {
    async fn get_team_by_id(&self, id: &str) -> DomainResult<Option<Team>>;
}
