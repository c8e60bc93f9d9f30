//! Error types for the reservo-db crate.
//!
//! Provides a unified error type that wraps `SQLx` errors with additional context.

use thiserror::Error;

/// Database operation errors.
///
/// This enum wraps all possible database errors with clear, actionable messages.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to establish or acquire a database connection.
    ///
    /// This typically indicates network issues, invalid credentials,
    /// or the database server being unavailable.
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    /// A database migration failed to apply.
    ///
    /// Check the migration SQL for syntax errors or constraint violations.
    #[error("Migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),

    /// A database query failed to execute.
    ///
    /// This can indicate SQL syntax errors, constraint violations,
    /// or issues with the query parameters.
    #[error("Query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failed_display() {
        let err = DbError::ConnectionFailed(sqlx::Error::PoolTimedOut);
        assert!(err.to_string().starts_with("Database connection failed"));
    }

    #[test]
    fn test_query_failed_from_sqlx() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::QueryFailed(_)));
    }
}
