//! Database connection pool management.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::error::DbError;

/// Default maximum number of pooled connections.
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default timeout when acquiring a connection from the pool.
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// A handle to the Postgres connection pool.
///
/// Cloning is cheap; all clones share the same underlying pool.
#[derive(Debug, Clone)]
pub struct DbPool {
    pool: PgPool,
}

impl DbPool {
    /// Connect to the database at `database_url` with default pool settings.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::ConnectionFailed`] if the pool cannot be established.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        Self::connect_with(database_url, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Connect with an explicit connection limit.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::ConnectionFailed`] if the pool cannot be established.
    pub async fn connect_with(database_url: &str, max_connections: u32) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(DEFAULT_ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await
            .map_err(DbError::ConnectionFailed)?;

        Ok(Self { pool })
    }

    /// Wrap an existing `PgPool`.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Access the underlying `sqlx` pool.
    #[must_use]
    pub fn inner(&self) -> &PgPool {
        &self.pool
    }
}
