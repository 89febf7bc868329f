use crate::domain::entities::BusinessHours;
use crate::domain::errors::DomainResult;

#[async_trait::async_trait]
pub trait BusinessHoursRepository: Send + Sync {
    /// Fails with `DomainError::NotFound` when the calendar does not exist
    async fn get_business_hours(&self, id: &str) -> DomainResult<BusinessHours>;
}
