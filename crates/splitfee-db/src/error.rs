//! Database errors

use thiserror::Error;
use tracing::debug;

/// Postgres SQLSTATE for unique constraint violations
const UNIQUE_VIOLATION: &str = "23505";

/// Database errors
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error
    #[error("database error: {0}")]
    Sqlx(sqlx::Error),

    /// Record not found
    #[error("record not found")]
    NotFound,

    /// Insert collided with an existing record
    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// Row changed since it was read
    #[error("version conflict: {0}")]
    VersionConflict(String),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                let constraint = db_err.constraint().unwrap_or("unique").to_string();
                debug!(constraint = %constraint, "Unique constraint violated");
                return Self::Duplicate(constraint);
            }
        }
        Self::Sqlx(err)
    }
}

/// Result alias for repository calls
pub type DbResult<T> = Result<T, DbError>;
