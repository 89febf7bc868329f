use crate::domain::entities::BusinessHours;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::business_hours_repository::BusinessHoursRepository;
use crate::infrastructure::persistence::{optional_column, Database};
use async_trait::async_trait;
use sqlx::Row;

impl Database {
    // ========================================
    // Business Hours Operations
    // ========================================

    pub async fn create_business_hours(&self, business_hours: &BusinessHours) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO business_hours (id, name, description, is_always_open, hours, holidays, timezone, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&business_hours.id)
        .bind(&business_hours.name)
        .bind(&business_hours.description)
        .bind(i64::from(business_hours.is_always_open))
        .bind(&business_hours.hours)
        .bind(&business_hours.holidays)
        .bind(&business_hours.timezone)
        .bind(&business_hours.created_at)
        .bind(&business_hours.updated_at)
        .execute(&self.pool)
        .await?;

        tracing::info!(
            "Business hours created: id={}, name={}",
            business_hours.id,
            business_hours.name
        );
        Ok(())
    }
}

#[async_trait]
impl BusinessHoursRepository for Database {
    async fn get_business_hours(&self, id: &str) -> DomainResult<BusinessHours> {
        let row = sqlx::query(
            "SELECT id, name, description, is_always_open, hours, holidays, timezone, created_at, updated_at
             FROM business_hours WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DomainError::NotFound(format!("Business hours not found: {}", id)))?;

        let is_always_open: i64 = row.try_get("is_always_open")?;
        Ok(BusinessHours {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: optional_column(&row, "description"),
            is_always_open: is_always_open != 0,
            hours: row.try_get("hours")?,
            holidays: row.try_get("holidays")?,
            timezone: optional_column(&row, "timezone"),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
