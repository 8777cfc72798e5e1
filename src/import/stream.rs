use std::io::Cursor;
use tracing::{debug, warn};

use super::source::{parse_error, read_headers, reader_builder, record_to_row, ParsedCsv};
use crate::error::IngestError;
use crate::schedule::AbortHandle;
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StreamOptions {
    pub(crate) chunk_bytes: usize,
}

impl StreamOptions {
    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self {
            chunk_bytes: settings.stream_chunk_bytes.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StreamProgress {
    pub(crate) rows_parsed: usize,
    pub(crate) bytes_consumed: u64,
    pub(crate) total_bytes: u64,
}

/// Terminal result of a stream. When `aborted` is set the rows are whatever
/// had been collected so far and should be treated as partial.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StreamOutcome {
    pub(crate) parsed: ParsedCsv,
    pub(crate) row_count: usize,
    pub(crate) aborted: bool,
}

#[derive(Debug)]
pub(crate) enum StreamPoll {
    /// One chunk was consumed; call `poll_chunk` again to continue.
    Pending(StreamProgress),
    Ready(StreamOutcome),
}

/// Chunked CSV parse that yields control back to the caller after every
/// `chunk_bytes` of input.
pub(crate) struct CsvStream {
    reader: csv::Reader<Cursor<Vec<u8>>>,
    record: csv::StringRecord,
    parsed: ParsedCsv,
    total_bytes: u64,
    chunk_bytes: u64,
    abort: AbortHandle,
    finished: bool,
}

impl CsvStream {
    /// Read the header row and return the stream with its abort handle.
    pub(crate) fn start(
        source: String,
        options: StreamOptions,
    ) -> Result<(Self, AbortHandle), IngestError> {
        let total_bytes = source.len() as u64;
        let mut reader = reader_builder().from_reader(Cursor::new(source.into_bytes()));
        let headers = read_headers(&mut reader)?;
        let abort = AbortHandle::new();
        let stream = Self {
            reader,
            record: csv::StringRecord::new(),
            parsed: ParsedCsv {
                headers,
                ..ParsedCsv::default()
            },
            total_bytes,
            chunk_bytes: options.chunk_bytes.max(1) as u64,
            abort: abort.clone(),
            finished: false,
        };
        Ok((stream, abort))
    }

    fn progress(&self) -> StreamProgress {
        StreamProgress {
            rows_parsed: self.parsed.rows.len(),
            bytes_consumed: self.reader.position().byte(),
            total_bytes: self.total_bytes,
        }
    }

    fn finish(&mut self, aborted: bool) -> StreamOutcome {
        self.finished = true;
        let parsed = std::mem::take(&mut self.parsed);
        let row_count = parsed.rows.len();
        if aborted {
            warn!(rows = row_count, "CSV stream aborted; result is partial");
        } else {
            debug!(rows = row_count, errors = parsed.errors.len(), "CSV stream complete");
        }
        StreamOutcome {
            parsed,
            row_count,
            aborted,
        }
    }

    /// Parse records until at least one chunk of bytes has been consumed or
    /// the input ends. The abort flag is checked before each chunk.
    pub(crate) fn poll_chunk(&mut self) -> StreamPoll {
        if self.finished {
            return StreamPoll::Ready(StreamOutcome {
                parsed: ParsedCsv::default(),
                row_count: 0,
                aborted: false,
            });
        }
        if self.abort.is_aborted() {
            return StreamPoll::Ready(self.finish(true));
        }

        let chunk_end = self.reader.position().byte() + self.chunk_bytes;
        loop {
            match self.reader.read_record(&mut self.record) {
                Ok(true) => {
                    if let Some(row) = record_to_row(&self.parsed.headers, &self.record) {
                        self.parsed.rows.push(row);
                    }
                }
                Ok(false) => return StreamPoll::Ready(self.finish(false)),
                Err(e) => self.parsed.errors.push(parse_error(&e)),
            }
            if self.reader.position().byte() >= chunk_end {
                return StreamPoll::Pending(self.progress());
            }
        }
    }

    /// Drive the stream to completion, calling `on_progress` between chunks.
    /// The callback may abort through the handle returned by `start`.
    pub(crate) fn run<F>(mut self, mut on_progress: F) -> StreamOutcome
    where
        F: FnMut(&StreamProgress),
    {
        loop {
            match self.poll_chunk() {
                StreamPoll::Pending(progress) => on_progress(&progress),
                StreamPoll::Ready(outcome) => return outcome,
            }
        }
    }
}

/// Whether a source is big enough that the streaming parser should be used.
pub(crate) fn should_stream(text: &str, settings: &Settings) -> bool {
    if text.len() >= settings.stream_auto_byte_threshold {
        return true;
    }
    text.lines().count() >= settings.stream_auto_line_threshold
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
