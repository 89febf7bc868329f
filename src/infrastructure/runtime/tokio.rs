use crate::domain::ports::time_service::TimeService;
use chrono::{DateTime, Utc};

/// Wall clock backed by the system time
#[derive(Clone, Default)]
pub struct TokioTimeService;

impl TokioTimeService {
    pub fn new() -> Self {
        Self
    }
}

impl TimeService for TokioTimeService {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
