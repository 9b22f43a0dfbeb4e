//! SQLite implementation of ICounterStore
//!
//! Every operation is a single statement, so SQLite's write lock makes it
//! atomic across all connections and processes sharing the database file.
//!
//! | Operation         | Statement                                              |
//! |-------------------|--------------------------------------------------------|
//! | `increment`       | upsert, `count = count + 1`, `RETURNING count`         |
//! | `decrement`       | `UPDATE ... MAX(count - 1, 0) RETURNING count`         |
//! | `read`            | `SELECT count`                                         |
//! | `increment_below` | upsert guarded by `WHERE count < ceiling`, `RETURNING` |

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::trace;

use msgate_core::ports::ICounterStore;

use crate::CacheError;

/// Counter store backed by the `admission_counters` table
#[derive(Clone)]
pub struct SqliteCounterStore {
    pool: SqlitePool,
}

impl SqliteCounterStore {
    /// Creates a store using the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Sets every counter back to zero
    ///
    /// Meant for startup of a single-node deployment, where counters left by
    /// a crashed process would otherwise hold slots forever.
    pub async fn reset_all(&self) -> Result<u64, CacheError> {
        let result = sqlx::query("UPDATE admission_counters SET count = 0, updated_at = ?")
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait::async_trait]
impl ICounterStore for SqliteCounterStore {
    async fn increment(&self, key: &str) -> anyhow::Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO admission_counters (key, count, updated_at)
            VALUES (?, 1, ?)
            ON CONFLICT(key) DO UPDATE
                SET count = admission_counters.count + 1,
                    updated_at = excluded.updated_at
            RETURNING count
            "#,
        )
        .bind(key)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(CacheError::from)?;

        trace!(key, count, "Incremented counter");
        Ok(count)
    }

    async fn decrement(&self, key: &str) -> anyhow::Result<i64> {
        let count: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE admission_counters
            SET count = MAX(count - 1, 0), updated_at = ?
            WHERE key = ?
            RETURNING count
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(CacheError::from)?;

        let count = count.unwrap_or(0);
        trace!(key, count, "Decremented counter");
        Ok(count)
    }

    async fn read(&self, key: &str) -> anyhow::Result<i64> {
        let count: Option<i64> =
            sqlx::query_scalar("SELECT count FROM admission_counters WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(CacheError::from)?;
        Ok(count.unwrap_or(0))
    }

    async fn increment_below(&self, key: &str, ceiling: i64) -> anyhow::Result<Option<i64>> {
        if ceiling <= 0 {
            return Ok(None);
        }

        let count: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO admission_counters (key, count, updated_at)
            VALUES (?, 1, ?)
            ON CONFLICT(key) DO UPDATE
                SET count = admission_counters.count + 1,
                    updated_at = excluded.updated_at
                WHERE admission_counters.count < ?
            RETURNING count
            "#,
        )
        .bind(key)
        .bind(Utc::now().to_rfc3339())
        .bind(ceiling)
        .fetch_optional(&self.pool)
        .await
        .map_err(CacheError::from)?;

        trace!(key, ceiling, ?count, "Conditional increment");
        Ok(count)
    }
}
