//! Unified error type for the data layer
//!
//! Repositories return `SqliteError`; everything above the repository seam
//! sees `DataError`.

use thiserror::Error;

use crate::data::sqlite::SqliteError;

#[derive(Error, Debug)]
pub enum DataError {
    /// SQLite database error
    #[error("SQLite error: {0}")]
    Sqlite(sqlx::Error),

    #[error("Migration {version} ({name}) failed: {error}")]
    MigrationFailed {
        version: i32,
        name: String,
        error: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unique constraint or concurrent-write conflict
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl DataError {
    /// Connection-level failures that may succeed on retry
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Sqlite(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
            ),
            _ => false,
        }
    }
}

impl From<SqliteError> for DataError {
    fn from(e: SqliteError) -> Self {
        match e {
            SqliteError::Database(e) => Self::Sqlite(e),
            SqliteError::MigrationFailed {
                version,
                name,
                error,
            } => Self::MigrationFailed {
                version,
                name,
                error,
            },
            SqliteError::Io(e) => Self::Io(e),
            SqliteError::Conflict(msg) => Self::Conflict(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_failure_keeps_detail() {
        let err: DataError = SqliteError::MigrationFailed {
            version: 2,
            name: "risks".into(),
            error: "syntax error".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Migration 2 (risks) failed: syntax error");
    }

    #[test]
    fn test_conflict_survives_conversion() {
        let err: DataError = SqliteError::Conflict("Email is already registered".into()).into();
        assert!(matches!(err, DataError::Conflict(ref m) if m == "Email is already registered"));
    }

    #[test]
    fn test_is_transient() {
        assert!(DataError::Sqlite(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!DataError::Sqlite(sqlx::Error::RowNotFound).is_transient());
        assert!(!DataError::Conflict("x".into()).is_transient());
    }
}
