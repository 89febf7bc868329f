use thiserror::Error;

/// Failures of the business-hours deadline calculation.
///
/// All of these are configuration problems: the calculation is aborted and
/// the error surfaces to the caller without any retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusinessHoursError {
    #[error("Duration must be greater than zero minutes")]
    InvalidDuration,
    #[error("Invalid timezone: {0}")]
    InvalidTimeZone(String),
    #[error("Invalid time of day: {0}")]
    InvalidTime(String),
    #[error("Invalid business hours data: {0}")]
    InvalidData(String),
    #[error("Deadline calculation exceeded {0} iterations; calendar has no usable open window")]
    MaxIterationsExceeded(usize),
}

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Entity not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    BusinessHours(#[from] BusinessHoursError),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DomainError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message();
                if message.contains("UNIQUE")
                    || message.contains("unique")
                    || message.contains("FOREIGN KEY")
                {
                    DomainError::Conflict(message.to_string())
                } else {
                    DomainError::Database(message.to_string())
                }
            }
            other => DomainError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Internal(format!("Serialization error: {}", err))
    }
}
