use crate::backend::{Backend, BackendTransaction};
use crate::dialect::{Dialect, SqliteDialect};
use crate::error::DbError;
use crate::pool::{ConnectionPool, PoolSettings, PoolStatus};
use crate::registry::BackendKind;
use async_trait::async_trait;
use core_types::{DATE_FORMAT, Row, TIMESTAMP_FORMAT, Value};
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqliteRow, SqliteSynchronous,
};
use sqlx::{Column, Executor, Row as _, Sqlite, TypeInfo, ValueRef};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SqliteLocation {
    File(PathBuf),
    Memory,
}

pub(crate) struct SqliteBackend {
    pool: ConnectionPool<Sqlite>,
    dialect: Arc<dyn Dialect>,
}

impl SqliteBackend {
    pub(crate) async fn connect(
        location: &SqliteLocation,
        settings: &PoolSettings,
    ) -> Result<Self, DbError> {
        let mut settings = *settings;
        let (options, pool_options) = match location {
            SqliteLocation::File(path) => {
                let options = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal)
                    .foreign_keys(true)
                    .busy_timeout(settings.busy_timeout);
                (options, ConnectionPool::<Sqlite>::options(&settings))
            }
            SqliteLocation::Memory => {
                // Every connection to `:memory:` sees its own database, so the
                // pool is pinned to a single connection that never expires.
                settings.capacity = 1;
                let options = SqliteConnectOptions::from_str("sqlite::memory:")
                    .map_err(DbError::Connection)?
                    .foreign_keys(true)
                    .busy_timeout(settings.busy_timeout);
                let pool_options = ConnectionPool::<Sqlite>::options(&settings)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None);
                (options, pool_options)
            }
        };

        debug!(?location, capacity = settings.capacity, "Opening SQLite pool");
        let pool = ConnectionPool::open(pool_options, options, settings).await?;
        Ok(Self {
            pool,
            dialect: Arc::new(SqliteDialect),
        })
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn dialect(&self) -> Arc<dyn Dialect> {
        Arc::clone(&self.dialect)
    }

    async fn begin(&self) -> Result<Box<dyn BackendTransaction>, DbError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTransaction { tx }))
    }

    async fn execute_ddl(&self, script: &str) -> Result<(), DbError> {
        let mut tx = self.pool.begin().await?;
        (&mut *tx)
            .execute(sqlx::raw_sql(script))
            .await
            .map_err(|source| DbError::Ddl {
                statement: script.to_string(),
                source,
            })?;
        tx.commit().await.map_err(DbError::Commit)
    }

    fn status(&self) -> PoolStatus {
        self.pool.status()
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

struct SqliteTransaction {
    tx: sqlx::Transaction<'static, Sqlite>,
}

#[async_trait]
impl BackendTransaction for SqliteTransaction {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError> {
        let query = params.iter().fold(sqlx::query(sql), bind_value);
        let rows = query.fetch_all(&mut *self.tx).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute_many(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<u64, DbError> {
        let mut affected = 0;
        for params in rows {
            let query = params.iter().fold(sqlx::query(sql), bind_value);
            affected += query.execute(&mut *self.tx).await?.rows_affected();
        }
        Ok(affected)
    }

    async fn commit(self: Box<Self>) -> Result<(), DbError> {
        self.tx.commit().await.map_err(DbError::Commit)
    }

    async fn rollback(self: Box<Self>) -> Result<(), DbError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &'q Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(Option::<i64>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.as_str()),
        Value::Decimal(d) => query.bind(d.to_string()),
        Value::Date(d) => query.bind(d.format(DATE_FORMAT).to_string()),
        Value::Timestamp(ts) => query.bind(ts.format(TIMESTAMP_FORMAT).to_string()),
    }
}

// SQLite is dynamically typed, so decoding follows the storage class of each
// value rather than the declared column type.
fn decode_row(row: &SqliteRow) -> Result<Row, DbError> {
    let mut out = Row::with_capacity(row.len());
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            let info = raw.type_info();
            match info.name() {
                "INTEGER" => Value::Int(row.try_get::<i64, _>(i)?),
                "REAL" => Value::Float(row.try_get::<f64, _>(i)?),
                "BLOB" => {
                    let bytes = row.try_get::<Vec<u8>, _>(i)?;
                    Value::Text(String::from_utf8_lossy(&bytes).into_owned())
                }
                _ => Value::Text(row.try_get::<String, _>(i)?),
            }
        };
        out.push(column.name(), value);
    }
    Ok(out)
}
