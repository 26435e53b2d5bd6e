//! Database error mapping.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("row not found")]
    RowNotFound,

    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("database connection error: {0}")]
    Connection(String),

    #[error("database query failed: {0}")]
    Query(String),
}

impl DatabaseError {
    /// Map an sqlx error into the service taxonomy.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::RowNotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DatabaseError::UniqueViolation {
                    constraint: db.constraint().unwrap_or("unknown").to_string(),
                }
            }
            e @ (sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)) => {
                DatabaseError::Connection(e.to_string())
            }
            other => DatabaseError::Query(other.to_string()),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, DatabaseError::Connection(_))
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DatabaseError::UniqueViolation { .. })
    }
}

impl From<DatabaseError> for crate::error::AppError {
    fn from(err: DatabaseError) -> Self {
        use crate::error::{AppError, AppErrorKind, InfrastructureError};

        let is_retryable = err.is_retryable();
        AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
            message: err.to_string(),
            is_retryable,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_cleanly() {
        let err = DatabaseError::from_sqlx(sqlx::Error::RowNotFound);
        assert!(matches!(err, DatabaseError::RowNotFound));
        assert!(!err.is_retryable());
    }

    #[test]
    fn connection_errors_are_retryable() {
        let err = DatabaseError::from_sqlx(sqlx::Error::PoolTimedOut);
        assert!(err.is_retryable());
    }
}
