use database::DbError;
use std::path::PathBuf;
use thiserror::Error;

/// Why a single CSV row was skipped. Never fatal to the chunk or the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowParseError {
    #[error("expected at least {expected} fields, found {found}")]
    TooFewFields { expected: usize, found: usize },

    #[error("invalid date '{0}', expected DD/MM/YYYY")]
    InvalidDate(String),

    #[error("invalid bill id '{0}'")]
    InvalidBillId(String),

    #[error("invalid currency code '{0}', expected three letters")]
    InvalidCurrency(String),

    #[error("customer name is empty")]
    EmptyName,

    #[error("invalid amount in {column}: '{value}'")]
    InvalidAmount { column: &'static str, value: String },
}

/// The row source itself failed. Ends the run after the current chunk.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to read record at line {line}: {source}")]
    Read {
        line: u64,
        #[source]
        source: csv::Error,
    },
}

/// Failures that prevent a run from starting.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Invalid ingestion options: {0}")]
    InvalidOptions(String),

    #[error("Failed to open the row source: {0}")]
    Source(#[from] SourceError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}
