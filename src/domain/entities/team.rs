use serde::{Deserialize, Serialize};

/// Team as seen by the SLA engine: only the calendar overrides matter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub business_hours_id: Option<String>,
    pub timezone: Option<String>, // IANA timezone (e.g., "America/New_York")
}

impl Team {
    pub fn new(name: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            business_hours_id: None,
            timezone: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
}

impl Agent {
    pub fn new(email: String, first_name: String, last_name: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            first_name,
            last_name,
        }
    }

    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}
