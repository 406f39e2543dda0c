//! # Rate Store
//!
//! Persistence for historical exchange rates in `fx_rates`, keyed by
//! `(date, currency)`. Every write is a single upsert inside a single
//! transaction scope, and `fetched_at` records when a rate was last written.

pub mod error;
pub mod schema;
pub mod store;

// --- Public API ---
pub use error::RateStoreError;
pub use schema::{ensure_schema, FX_COLUMNS, FX_TABLE, FX_UPSERT};
pub use store::{load_rates, store_rates, sync_rates};
