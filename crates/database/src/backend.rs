//! The adapter seam between the transaction manager and a concrete engine.

use crate::dialect::Dialect;
use crate::error::DbError;
use crate::pool::PoolStatus;
use crate::registry::BackendKind;
use async_trait::async_trait;
use core_types::{Row, Value};
use std::sync::Arc;

/// A connected storage engine: a pool plus the SQL hooks for its dialect.
#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn dialect(&self) -> Arc<dyn Dialect>;

    /// Checks a connection out of the pool and opens a transaction on it.
    async fn begin(&self) -> Result<Box<dyn BackendTransaction>, DbError>;

    /// Runs a multi-statement schema script on its own connection and commits it.
    async fn execute_ddl(&self, script: &str) -> Result<(), DbError>;

    fn status(&self) -> PoolStatus;

    async fn close(&self);
}

/// One open transaction holding one pooled connection.
///
/// Dropping the box without calling `commit` or `rollback` rolls the
/// transaction back and returns the connection to the pool.
#[async_trait]
pub trait BackendTransaction: Send {
    /// Runs one statement and returns any rows it produced.
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError>;

    /// Runs one statement once per parameter row; returns total rows affected.
    async fn execute_many(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<u64, DbError>;

    async fn commit(self: Box<Self>) -> Result<(), DbError>;

    async fn rollback(self: Box<Self>) -> Result<(), DbError>;
}
