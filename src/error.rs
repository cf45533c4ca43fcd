// Allow module inception for error types - this is a common Rust pattern
#![allow(clippy::module_name_repetitions)]

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Filter error: {0}")]
    Filter(#[source] anyhow::Error),

    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Operation panicked: {0}")]
    Panicked(String),

    #[error("Executor error: {0}")]
    Executor(String),

    #[error("Query cancelled")]
    Cancelled,

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Query rejected: {0}")]
    Rejected(String),
}

impl QueryError {
    /// Whether the error came from the storage layer rather than the engine
    #[must_use]
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Sql(_) | Self::Decode(_))
    }
}

pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_family() {
        assert!(QueryError::Backend("timeout".to_string()).is_backend());
        assert!(QueryError::Sql(sqlx::Error::RowNotFound).is_backend());
        assert!(!QueryError::Configuration("x".to_string()).is_backend());
        assert!(!QueryError::Panicked("boom".to_string()).is_backend());
    }

    #[test]
    fn test_filter_error_display() {
        let err = QueryError::Filter(anyhow::anyhow!("bad status value"));
        assert_eq!(err.to_string(), "Filter error: bad status value");
    }
}
