//! Connection pool creation and configuration.
//!
//! Wraps `sqlx::Pool`, which owns the bounded set of physical connections. A
//! checked-out connection (or transaction) belongs to exactly one caller until
//! it is dropped, and dropping it is the release: a transaction that was never
//! committed is rolled back by the driver before the connection is handed to
//! anyone else, and a connection that broke is closed and replaced.

use crate::error::DbError;
use sqlx::pool::PoolOptions;
use sqlx::{Connection, Database, Pool, Transaction};
use std::time::Duration;

/// Runtime tunables for the connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Maximum number of pooled connections. Fixed for the lifetime of the pool.
    pub capacity: u32,

    /// How long `acquire` blocks on an exhausted pool before giving up.
    pub acquire_timeout: Duration,

    /// Busy timeout for SQLite connections waiting on the write lock.
    pub busy_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            capacity: 4,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// A point-in-time view of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub capacity: u32,
    /// Physical connections currently open (idle or checked out).
    pub open: u32,
    pub idle: u32,
}

impl PoolStatus {
    pub fn in_use(&self) -> u32 {
        self.open.saturating_sub(self.idle)
    }
}

pub(crate) struct ConnectionPool<DB: Database> {
    pool: Pool<DB>,
    settings: PoolSettings,
}

impl<DB: Database> ConnectionPool<DB> {
    /// Base pool options shared by every backend.
    pub(crate) fn options(settings: &PoolSettings) -> PoolOptions<DB> {
        PoolOptions::new()
            .max_connections(settings.capacity)
            .min_connections(0)
            .acquire_timeout(settings.acquire_timeout)
            .test_before_acquire(true)
    }

    pub(crate) async fn open(
        options: PoolOptions<DB>,
        connect: <DB::Connection as Connection>::Options,
        settings: PoolSettings,
    ) -> Result<Self, DbError> {
        let pool = options
            .connect_with(connect)
            .await
            .map_err(DbError::Connection)?;
        Ok(Self { pool, settings })
    }

    /// Checks out a connection and issues `BEGIN` on it.
    pub(crate) async fn begin(&self) -> Result<Transaction<'static, DB>, DbError> {
        self.pool.begin().await.map_err(|e| self.acquire_error(e))
    }

    fn acquire_error(&self, err: sqlx::Error) -> DbError {
        match err {
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted {
                timeout: self.settings.acquire_timeout,
            },
            sqlx::Error::PoolClosed => DbError::PoolClosed,
            other => DbError::Query(other),
        }
    }

    pub(crate) fn status(&self) -> PoolStatus {
        PoolStatus {
            capacity: self.pool.options().get_max_connections(),
            open: self.pool.size(),
            idle: u32::try_from(self.pool.num_idle()).unwrap_or(u32::MAX),
        }
    }

    pub(crate) async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_use_counts_checked_out_connections() {
        let status = PoolStatus {
            capacity: 4,
            open: 3,
            idle: 1,
        };
        assert_eq!(status.in_use(), 2);
    }
}
