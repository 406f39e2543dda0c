//! Concrete engine adapters. Only the registry constructs these.

mod postgres;
mod sqlite;

pub(crate) use postgres::PostgresBackend;
pub(crate) use sqlite::{SqliteBackend, SqliteLocation};
