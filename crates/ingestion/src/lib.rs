//! # Ingestion Crate
//!
//! Streams a billing CSV export into `usage_data` in bounded, independently
//! committed chunks.
//!
//! - `CsvRowSource`: lazy, forward-only reader of raw records.
//! - `Chunker`: groups raw records into chunks of at most `chunk_size`.
//! - `parse_row`: turns one raw record into a `UsageRecord`, or a `RowParseError`.
//! - `ingest` / `ingest_file`: the run itself, returning an `IngestReport`.

pub mod chunk;
pub mod error;
pub mod parse;
pub mod pipeline;
pub mod schema;
pub mod source;

pub use chunk::{Chunk, Chunker};
pub use error::{IngestError, RowParseError, SourceError};
pub use parse::{parse_date, parse_row};
pub use pipeline::{
    ChunkFailure, IngestOptions, IngestReport, MAX_SKIP_SAMPLES, SkippedRow, ingest, ingest_file,
};
pub use schema::{USAGE_TABLE, USAGE_UPSERT, ensure_schema};
pub use source::{CsvRowSource, RawRecord};
