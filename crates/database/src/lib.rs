//! # Database Crate
//!
//! The backend-agnostic transactional layer. Every read and write in the
//! system goes through a [`DatabaseService`], which owns a bounded connection
//! pool for one storage engine and hands out transaction scopes over it.
//!
//! ## Architectural Principles
//!
//! - **One scope, one connection:** `run_in_transaction` checks out a single
//!   pooled connection, lends it to the body as a `&mut Transaction`, and
//!   commits on success or rolls back on failure. Scopes do not nest.
//! - **Closed backend set:** the engine is picked from the URL scheme by
//!   [`BackendKind`]. The concrete adapters are private; callers only see the
//!   [`Backend`] and [`Dialect`] seams.
//! - **Portable writes:** [`UpsertTarget`] and [`TableDef`] are rendered to SQL
//!   by the active dialect, so callers never hand-write engine-specific upserts
//!   or DDL.
//!
//! ## Public API
//!
//! - `connect`: Opens the pool named by a URL and returns a `DatabaseService`.
//! - `DatabaseService`: `run_in_transaction`, `execute_ddl`, `pool_status`, `close`.
//! - `Transaction`: `execute`, `execute_many`, `upsert`, `batch_insert`.
//! - `DbError`: The specific error types that can be returned from this crate.

pub mod backend;
mod backends;
pub mod dialect;
pub mod error;
pub mod pool;
pub mod registry;
pub mod schema;
pub mod service;

// Re-export the key components to create a clean, public-facing API.
pub use backend::{Backend, BackendTransaction};
pub use dialect::{validate_identifier, Dialect, UpsertTarget};
pub use error::DbError;
pub use pool::{PoolSettings, PoolStatus};
pub use registry::{connect, BackendKind};
pub use schema::{ColumnDef, ColumnDefault, ColumnType, IndexDef, TableDef};
pub use service::{in_transaction, DatabaseService, Transaction};

// Transaction bodies are boxed futures; re-exported so callers need not depend
// on `futures` just to write one.
pub use futures::future::{BoxFuture, FutureExt};
