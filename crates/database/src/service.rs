//! The transactional service and its transaction handle.
//!
//! All data access goes through [`DatabaseService::run_in_transaction`]. The
//! body receives a `&mut Transaction` bound to one pooled connection; when the
//! body returns `Ok` the transaction is committed, when it returns `Err` the
//! transaction is rolled back and the error is handed back unchanged. If the
//! body panics or its future is dropped, the transaction is dropped with it and
//! the driver rolls it back before the connection is reused.
//!
//! ```ignore
//! let written = service
//!     .run_in_transaction(move |tx| async move { tx.upsert(&TARGET, &rows).await }.boxed())
//!     .await?;
//! ```

use crate::backend::{Backend, BackendTransaction};
use crate::dialect::{Dialect, UpsertTarget};
use crate::error::DbError;
use crate::pool::{PoolSettings, PoolStatus};
use crate::registry::BackendKind;
use core_types::{Row, Value};
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, warn};

tokio::task_local! {
    // Present while a transaction body is running on the current task.
    static TRANSACTION_ACTIVE: ();
}

/// Whether the current task is inside a `run_in_transaction` body.
pub fn in_transaction() -> bool {
    TRANSACTION_ACTIVE.try_with(|_| ()).is_ok()
}

/// A cheaply cloneable handle to one connection pool.
#[derive(Clone)]
pub struct DatabaseService {
    backend: Arc<dyn Backend>,
}

impl DatabaseService {
    pub(crate) fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Shorthand for [`crate::connect`].
    pub async fn connect(url: &str, settings: &PoolSettings) -> Result<Self, DbError> {
        crate::registry::connect(url, settings).await
    }

    /// Runs `body` inside a single transaction on a single pooled connection.
    ///
    /// Blocks for at most the pool's acquire timeout waiting for a connection.
    /// Scopes do not nest: calling this from inside a body on the same task
    /// fails with [`DbError::NestedTransaction`] without touching the pool.
    pub async fn run_in_transaction<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<T, E>>,
        E: From<DbError>,
    {
        if in_transaction() {
            return Err(DbError::NestedTransaction.into());
        }

        let inner = self.backend.begin().await?;
        let mut tx = Transaction {
            inner: Some(inner),
            dialect: self.backend.dialect(),
        };
        debug!("Transaction started.");

        let outcome = TRANSACTION_ACTIVE.scope((), body(&mut tx)).await;
        match outcome {
            Ok(value) => {
                tx.commit().await?;
                debug!("Transaction committed.");
                Ok(value)
            }
            Err(err) => {
                tx.rollback().await;
                debug!("Transaction rolled back.");
                Err(err)
            }
        }
    }

    /// Runs a schema script on its own connection and commits it immediately.
    ///
    /// Must be called outside any transaction scope. A failing script leaves
    /// in-flight transactions on other connections untouched.
    pub async fn execute_ddl(&self, script: &str) -> Result<(), DbError> {
        if in_transaction() {
            return Err(DbError::DdlInsideTransaction);
        }
        match self.backend.execute_ddl(script).await {
            Ok(()) => {
                debug!("Schema script applied.");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Schema script failed.");
                Err(e)
            }
        }
    }

    pub fn pool_status(&self) -> PoolStatus {
        self.backend.status()
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn dialect(&self) -> Arc<dyn Dialect> {
        self.backend.dialect()
    }

    /// Closes the pool, waiting for checked-out connections to come back.
    pub async fn close(&self) {
        self.backend.close().await;
    }
}

/// An open transaction, lent to a `run_in_transaction` body.
///
/// Once the underlying connection is lost every operation fails with
/// [`DbError::NoActiveTransaction`]; the engine discards the uncommitted work.
pub struct Transaction {
    inner: Option<Box<dyn BackendTransaction>>,
    dialect: Arc<dyn Dialect>,
}

impl Transaction {
    fn active(&mut self) -> Result<&mut Box<dyn BackendTransaction>, DbError> {
        self.inner.as_mut().ok_or(DbError::NoActiveTransaction)
    }

    // A broken connection cannot carry the transaction any further.
    fn sever_if_lost<T>(&mut self, result: Result<T, DbError>) -> Result<T, DbError> {
        if let Err(DbError::Query(sqlx::Error::Io(e))) = &result {
            warn!(error = %e, "Connection lost mid-transaction.");
            self.inner = None;
        }
        result
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_some()
    }

    /// Runs one statement with positional parameters and returns its rows.
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError> {
        let result = self.active()?.execute(sql, params).await;
        self.sever_if_lost(result)
    }

    /// Runs `sql` once per parameter row, in order. Returns rows affected.
    pub async fn execute_many(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<u64, DbError> {
        let result = self.active()?.execute_many(sql, rows).await;
        self.sever_if_lost(result)
    }

    /// Inserts `rows`, overwriting the non-key columns of any row whose
    /// conflict key already exists. An empty `rows` is a no-op.
    pub async fn upsert(
        &mut self,
        target: &UpsertTarget<'_>,
        rows: &[Vec<Value>],
    ) -> Result<u64, DbError> {
        let sql = self.dialect.upsert_sql(target)?;
        check_widths(target.columns.len(), rows)?;
        if rows.is_empty() {
            return Ok(0);
        }
        self.execute_many(&sql, rows).await
    }

    /// Plain insert with no conflict handling; a duplicate key fails the statement.
    pub async fn batch_insert(
        &mut self,
        table: &str,
        columns: &[&str],
        rows: &[Vec<Value>],
    ) -> Result<u64, DbError> {
        let sql = self.dialect.insert_sql(table, columns)?;
        check_widths(columns.len(), rows)?;
        if rows.is_empty() {
            return Ok(0);
        }
        self.execute_many(&sql, rows).await
    }

    /// The bind placeholder for 1-based parameter `index` in this backend's syntax.
    pub fn placeholder(&self, index: usize) -> String {
        self.dialect.placeholder(index)
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    async fn commit(mut self) -> Result<(), DbError> {
        let inner = self.inner.take().ok_or(DbError::NoActiveTransaction)?;
        inner.commit().await
    }

    async fn rollback(mut self) {
        if let Some(inner) = self.inner.take() {
            if let Err(e) = inner.rollback().await {
                warn!(error = %e, "Rollback failed; the connection will be discarded.");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn abandon(&mut self) {
        self.inner = None;
    }
}

fn check_widths(expected: usize, rows: &[Vec<Value>]) -> Result<(), DbError> {
    match rows.iter().find(|row| row.len() != expected) {
        Some(row) => Err(DbError::ColumnCount {
            expected,
            got: row.len(),
        }),
        None => Ok(()),
    }
}
