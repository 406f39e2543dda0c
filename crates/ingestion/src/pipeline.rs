//! The chunked ingestion run.
//!
//! Each chunk is parsed, then written with a single upsert inside a single
//! transaction scope, so a chunk is either fully committed or not at all.
//! Because every write is keyed on `(date, bill_id)`, rerunning the same input
//! from the start converges on the same table contents.

use crate::chunk::{Chunk, Chunker};
use crate::error::{IngestError, RowParseError, SourceError};
use crate::parse::parse_row;
use crate::schema::{USAGE_UPSERT, ensure_schema};
use crate::source::{CsvRowSource, RawRecord};
use configuration::{ChunkFailurePolicy, IngestSettings};
use core_types::Value;
use database::{DatabaseService, DbError, FutureExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// At most this many skipped rows are kept in the report; the count is exact.
pub const MAX_SKIP_SAMPLES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOptions {
    /// Raw records per chunk, malformed ones included.
    pub chunk_size: usize,
    /// Attempts per chunk for retryable failures.
    pub max_chunk_attempts: u32,
    pub on_chunk_failure: ChunkFailurePolicy,
    /// Pause before retry `n` is `retry_delay * n`.
    pub retry_delay: Duration,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            chunk_size: 5000,
            max_chunk_attempts: 3,
            on_chunk_failure: ChunkFailurePolicy::Continue,
            retry_delay: Duration::from_millis(100),
        }
    }
}

impl From<&IngestSettings> for IngestOptions {
    fn from(settings: &IngestSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            max_chunk_attempts: settings.max_chunk_attempts,
            on_chunk_failure: settings.on_chunk_failure,
            ..Self::default()
        }
    }
}

impl IngestOptions {
    fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidOptions(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if self.max_chunk_attempts == 0 {
            return Err(IngestError::InvalidOptions(
                "max_chunk_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    pub line: u64,
    pub error: RowParseError,
}

/// A chunk that could not be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFailure {
    pub chunk: usize,
    pub first_line: u64,
    pub last_line: u64,
    /// Well-formed rows that were not written.
    pub rows: usize,
    pub attempts: u32,
    pub error: String,
}

/// The outcome of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Non-blank records pulled from the source.
    pub rows_read: usize,
    /// Rows in committed chunks.
    pub rows_written: usize,
    pub rows_skipped: usize,
    /// The first [`MAX_SKIP_SAMPLES`] skipped rows.
    pub skipped: Vec<SkippedRow>,
    pub failed_chunks: Vec<ChunkFailure>,
    pub chunks_committed: usize,
    /// Why the run stopped early, if it did.
    pub aborted: Option<String>,
}

impl IngestReport {
    /// Well-formed rows lost to chunks that were never committed.
    pub fn rows_failed(&self) -> usize {
        self.failed_chunks.iter().map(|f| f.rows).sum()
    }

    /// True when every chunk committed and the source was read to the end.
    /// Skipped rows do not count against success.
    pub fn is_success(&self) -> bool {
        self.failed_chunks.is_empty() && self.aborted.is_none()
    }

    fn record_skip(&mut self, line: u64, error: RowParseError) {
        self.rows_skipped += 1;
        if self.skipped.len() < MAX_SKIP_SAMPLES {
            self.skipped.push(SkippedRow { line, error });
        }
    }
}

/// Opens `path` as CSV and ingests it. See [`ingest`].
pub async fn ingest_file(
    service: &DatabaseService,
    path: &Path,
    options: &IngestOptions,
) -> Result<IngestReport, IngestError> {
    let source = CsvRowSource::open(path)?;
    info!(path = %path.display(), chunk_size = options.chunk_size, "Starting ingestion.");
    ingest(service, source, options).await
}

/// Ingests every record of `source` into `usage_data`.
///
/// Returns `Err` only when the run cannot start (bad options, schema creation
/// failed). Everything that goes wrong once rows are flowing is recorded in
/// the report: malformed rows are skipped, failed chunks are listed, and a
/// source error or an `abort` policy stops the run with `aborted` set.
pub async fn ingest<I>(
    service: &DatabaseService,
    source: I,
    options: &IngestOptions,
) -> Result<IngestReport, IngestError>
where
    I: Iterator<Item = Result<RawRecord, SourceError>>,
{
    options.validate()?;
    ensure_schema(service).await?;

    let mut report = IngestReport::default();
    for chunk in Chunker::new(source, options.chunk_size) {
        report.rows_read += chunk.records.len();
        let span = chunk.line_span().unwrap_or_default();
        let Chunk {
            index,
            records,
            source_error,
        } = chunk;

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            match parse_row(&record.fields) {
                Ok(usage) => rows.push(usage.to_values()),
                Err(e) => {
                    warn!(line = record.line, error = %e, "Skipping malformed row.");
                    report.record_skip(record.line, e);
                }
            }
        }

        if !rows.is_empty() {
            let row_count = rows.len();
            match write_chunk(service, Arc::new(rows), options).await {
                Ok(attempts) => {
                    report.rows_written += row_count;
                    report.chunks_committed += 1;
                    info!(
                        chunk = index + 1,
                        rows = row_count,
                        attempts,
                        total = report.rows_written,
                        "Chunk committed."
                    );
                }
                Err((attempts, e)) => {
                    error!(
                        chunk = index + 1,
                        first_line = span.0,
                        last_line = span.1,
                        attempts,
                        error = %e,
                        "Chunk rolled back."
                    );
                    report.failed_chunks.push(ChunkFailure {
                        chunk: index,
                        first_line: span.0,
                        last_line: span.1,
                        rows: row_count,
                        attempts,
                        error: e.to_string(),
                    });
                    if e.is_usage_error() {
                        report.aborted = Some(format!("unrecoverable database usage error: {e}"));
                        break;
                    }
                    if options.on_chunk_failure == ChunkFailurePolicy::Abort {
                        report.aborted = Some(format!("chunk {} failed: {e}", index + 1));
                        break;
                    }
                }
            }
        }

        if let Some(e) = source_error {
            error!(error = %e, "Row source failed; stopping.");
            report.aborted = Some(e.to_string());
            break;
        }
    }

    info!(
        read = report.rows_read,
        written = report.rows_written,
        skipped = report.rows_skipped,
        failed = report.rows_failed(),
        "Ingestion finished."
    );
    Ok(report)
}

/// Upserts one chunk, retrying the whole scope on retryable failures.
/// Returns the number of attempts used.
async fn write_chunk(
    service: &DatabaseService,
    rows: Arc<Vec<Vec<Value>>>,
    options: &IngestOptions,
) -> Result<u32, (u32, DbError)> {
    let mut attempt = 1;
    loop {
        let batch = Arc::clone(&rows);
        let result: Result<u64, DbError> = service
            .run_in_transaction(move |tx| {
                async move { tx.upsert(&USAGE_UPSERT, &batch).await }.boxed()
            })
            .await;

        match result {
            Ok(_) => return Ok(attempt),
            Err(e) if e.is_retryable() && attempt < options.max_chunk_attempts => {
                warn!(attempt, error = %e, "Chunk write failed; retrying.");
                tokio::time::sleep(options.retry_delay * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err((attempt, e)),
        }
    }
}
