use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("No connection became available within {timeout:?}; the pool is exhausted.")]
    PoolExhausted { timeout: Duration },

    #[error("The connection pool has been closed.")]
    PoolClosed,

    #[error("No active transaction. Data operations must run inside `run_in_transaction`.")]
    NoActiveTransaction,

    #[error("A transaction is already active on this task; nested transactions are not supported.")]
    NestedTransaction,

    #[error("DDL cannot run inside a transaction scope; call `execute_ddl` outside `run_in_transaction`.")]
    DdlInsideTransaction,

    #[error("DDL statement failed: {source}")]
    Ddl {
        statement: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to commit the transaction: {0}")]
    Commit(#[source] sqlx::Error),

    #[error("Failed to connect to the database: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Unsupported database URL scheme: {0}")]
    UnsupportedUrl(String),

    #[error("'{0}' is not a valid SQL identifier.")]
    InvalidIdentifier(String),

    #[error("Invalid upsert: {0}")]
    InvalidUpsert(String),

    #[error("Row has {got} values but {expected} columns were named.")]
    ColumnCount { expected: usize, got: usize },
}

impl DbError {
    /// Whether retrying the whole unit of work may succeed.
    ///
    /// Covers pool exhaustion, dropped connections, Postgres serialization
    /// failures and deadlocks, and SQLite busy/locked databases.
    pub fn is_retryable(&self) -> bool {
        match self {
            DbError::PoolExhausted { .. } => true,
            DbError::Query(e) | DbError::Commit(e) => is_transient_sqlx(e),
            _ => false,
        }
    }

    /// Programming errors: retrying cannot help and the caller should stop.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            DbError::NoActiveTransaction
                | DbError::NestedTransaction
                | DbError::DdlInsideTransaction
                | DbError::InvalidIdentifier(_)
                | DbError::InvalidUpsert(_)
                | DbError::ColumnCount { .. }
        )
    }
}

fn is_transient_sqlx(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut => true,
        // 40001 serialization_failure, 40P01 deadlock_detected, 5 SQLITE_BUSY, 6 SQLITE_LOCKED
        sqlx::Error::Database(db) => matches!(
            db.code().as_deref(),
            Some("40001" | "40P01" | "5" | "6" | "517")
        ),
        _ => false,
    }
}
