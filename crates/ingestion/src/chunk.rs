use crate::error::SourceError;
use crate::source::RawRecord;

/// A group of at most `chunk_size` consecutive raw records.
///
/// When the source fails, the records read before the failure form a final,
/// possibly short chunk that carries the error.
#[derive(Debug)]
pub struct Chunk {
    /// Zero-based position of the chunk in the run.
    pub index: usize,
    pub records: Vec<RawRecord>,
    pub source_error: Option<SourceError>,
}

impl Chunk {
    /// The input lines this chunk spans, if it holds any records.
    pub fn line_span(&self) -> Option<(u64, u64)> {
        Some((self.records.first()?.line, self.records.last()?.line))
    }
}

/// Groups a row source into chunks, pulling records strictly forward.
pub struct Chunker<I> {
    source: I,
    chunk_size: usize,
    next_index: usize,
    finished: bool,
}

impl<I> Chunker<I>
where
    I: Iterator<Item = Result<RawRecord, SourceError>>,
{
    /// A `chunk_size` of zero is treated as one.
    pub fn new(source: I, chunk_size: usize) -> Self {
        Self {
            source,
            chunk_size: chunk_size.max(1),
            next_index: 0,
            finished: false,
        }
    }
}

impl<I> Iterator for Chunker<I>
where
    I: Iterator<Item = Result<RawRecord, SourceError>>,
{
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.finished {
            return None;
        }

        let mut records = Vec::with_capacity(self.chunk_size.min(1024));
        let mut source_error = None;
        while records.len() < self.chunk_size {
            match self.source.next() {
                Some(Ok(record)) => records.push(record),
                Some(Err(e)) => {
                    source_error = Some(e);
                    self.finished = true;
                    break;
                }
                None => {
                    self.finished = true;
                    break;
                }
            }
        }

        if records.is_empty() && source_error.is_none() {
            return None;
        }
        let index = self.next_index;
        self.next_index += 1;
        Some(Chunk {
            index,
            records,
            source_error,
        })
    }
}
