use crate::domain::entities::Team;
use crate::domain::errors::DomainResult;
use crate::domain::ports::team_repository::TeamRepository;
use crate::infrastructure::persistence::{format_timestamp, optional_column, Database};
use async_trait::async_trait;
use sqlx::Row;

impl Database {
    pub async fn create_team(&self, team: &Team) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO teams (id, name, business_hours_id, timezone, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&team.id)
        .bind(&team.name)
        .bind(&team.business_hours_id)
        .bind(&team.timezone)
        .bind(format_timestamp(chrono::Utc::now()))
        .execute(&self.pool)
        .await?;

        tracing::info!("Team created: id={}, name={}", team.id, team.name);
        Ok(())
    }
}

#[async_trait]
impl TeamRepository for Database {
    async fn get_team_by_id(&self, id: &str) -> DomainResult<Option<Team>> {
        let row = sqlx::query(
            "SELECT id, name, business_hours_id, timezone FROM teams WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            Ok(Some(Team {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                business_hours_id: optional_column(&row, "business_hours_id"),
                timezone: optional_column(&row, "timezone"),
            }))
        } else {
            Ok(None)
        }
    }
}
