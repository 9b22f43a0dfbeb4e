//! msgate Cache - Shared admission counters
//!
//! Adapters for the `ICounterStore` port from `msgate-core`:
//!
//! - [`SqliteCounterStore`] - counters in a SQLite database file. Several
//!   worker processes pointed at the same file share one set of counters.
//! - [`InMemoryCounterStore`] - counters in a concurrent map, for single
//!   process deployments and tests.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use msgate_cache::{DatabasePool, SqliteCounterStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/var/lib/msgate/counters.db")).await?;
//! let store = SqliteCounterStore::new(pool.pool().clone());
//! // Use store as ICounterStore...
//! # Ok(())
//! # }
//! ```

pub mod counter;
pub mod memory;
pub mod pool;

pub use counter::SqliteCounterStore;
pub use memory::InMemoryCounterStore;
pub use pool::DatabasePool;

/// Errors that can occur during counter store operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_detail() {
        let err = CacheError::ConnectionFailed("disk full".to_string());
        assert_eq!(err.to_string(), "Connection failed: disk full");
    }

    #[test]
    fn sqlx_errors_become_query_failures() {
        let err: CacheError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, CacheError::QueryFailed(_)));
    }
}
