use chrono::{DateTime, Utc};

/// Wall clock used by evaluation and dispatch, replaceable in tests
pub trait TimeService: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
