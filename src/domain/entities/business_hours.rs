use serde::{Deserialize, Serialize};

/// Business hours calendar used for SLA deadline calculation.
///
/// `hours` and `holidays` are kept as the raw JSON documents they are stored
/// as; they are parsed by the deadline calculator so that malformed data
/// surfaces as a calculation error instead of a load error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessHours {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_always_open: bool,
    /// JSON: {"Monday": {"open": "09:00", "close": "17:00"}, "Sunday": {"closed_all_day": true}, ...}
    pub hours: String,
    /// JSON: [{"name": "New Year", "date": "2024-01-01"}] or ["2024-01-01"]
    pub holidays: String,
    pub timezone: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl BusinessHours {
    pub fn new(name: String, hours: String, holidays: String, timezone: Option<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            description: None,
            is_always_open: false,
            hours,
            holidays,
            timezone,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// A calendar that counts every minute.
    pub fn always_open(name: String) -> Self {
        let mut business_hours = Self::new(name, "{}".to_string(), "[]".to_string(), None);
        business_hours.is_always_open = true;
        business_hours
    }
}

/// Opening window for one weekday
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayHours {
    #[serde(default)]
    pub open: String, // "09:00"
    #[serde(default)]
    pub close: String, // "17:00"
    #[serde(default, alias = "closedAllDay")]
    pub closed_all_day: bool,
    #[serde(default, alias = "openAllDay")]
    pub open_all_day: bool,
}

/// Holiday entry; dates are exact calendar days, never recurring
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HolidayEntry {
    Named { name: Option<String>, date: String },
    Date(String),
}

impl HolidayEntry {
    pub fn date(&self) -> &str {
        match self {
            HolidayEntry::Named { date, .. } => date,
            HolidayEntry::Date(date) => date,
        }
    }
}
