pub mod error;
pub mod records;
pub mod value;

// Re-export the core types to provide a clean public API.
pub use error::CoreError;
pub use records::{FxRate, UsageRecord, MONEY_SCALE};
pub use value::{Row, Value, DATE_FORMAT, TIMESTAMP_FORMAT};
