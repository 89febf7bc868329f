use crate::domain::entities::Agent;
use crate::domain::errors::DomainResult;
use crate::domain::ports::agent_repository::AgentRepository;
use crate::infrastructure::persistence::{format_timestamp, optional_column, Database};
use async_trait::async_trait;
use sqlx::Row;

impl Database {
    pub async fn create_agent(&self, agent: &Agent) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO agents (id, email, first_name, last_name, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&agent.id)
        .bind(&agent.email)
        .bind(&agent.first_name)
        .bind(&agent.last_name)
        .bind(format_timestamp(chrono::Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl AgentRepository for Database {
    async fn get_agent(&self, id: &str) -> DomainResult<Option<Agent>> {
        let row = sqlx::query("SELECT id, email, first_name, last_name FROM agents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Agent {
                id: row.try_get("id")?,
                email: row.try_get("email")?,
                first_name: row.try_get("first_name")?,
                last_name: optional_column(&row, "last_name"),
            })),
            None => Ok(None),
        }
    }
}
