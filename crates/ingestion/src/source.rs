//! Forward-only row sources.

use crate::error::SourceError;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// One unparsed input record and the line it started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub line: u64,
    pub fields: Vec<String>,
}

impl RawRecord {
    pub fn new(line: u64, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            line,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// Lazily reads CSV records, skipping the header row and blank lines.
///
/// Records may have any number of fields; checking the shape is left to the
/// row parser so a short row is skipped rather than ending the run.
pub struct CsvRowSource<R: Read> {
    records: csv::StringRecordsIntoIter<R>,
}

impl CsvRowSource<File> {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let reader = builder()
            .from_path(path)
            .map_err(|source| SourceError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            records: reader.into_records(),
        })
    }
}

impl<R: Read> CsvRowSource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            records: builder().from_reader(reader).into_records(),
        }
    }
}

fn builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.has_headers(true).flexible(true);
    builder
}

impl<R: Read> Iterator for CsvRowSource<R> {
    type Item = Result<RawRecord, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(source) => {
                    let line = source.position().map_or(0, |p| p.line());
                    return Some(Err(SourceError::Read { line, source }));
                }
            };
            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }
            let line = record.position().map_or(0, |p| p.line());
            return Some(Ok(RawRecord::new(line, record.iter())));
        }
    }
}
