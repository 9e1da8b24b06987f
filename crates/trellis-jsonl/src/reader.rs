//! JSONL reading operations.
//!
//! This module provides async functionality for reading JSONL data line-by-line
//! with line number tracking, and a resilient stream that skips lines which
//! fail to parse while recording a [`Warning`] for each of them.

use crate::warning::{Warning, WarningCollector};
use crate::{Error, Result};
use futures::stream::{self, Stream, TryStreamExt};
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Async reader for JSONL (JSON Lines) data.
///
/// `JsonlReader` wraps an async reader and provides buffered reading of JSONL
/// formatted data. It tracks line numbers so warnings can point at the
/// offending line.
///
/// # Examples
///
/// ```no_run
/// use trellis_jsonl::reader::JsonlReader;
/// use tokio::fs::File;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let file = File::open("issues.jsonl").await?;
/// let reader = JsonlReader::new(file);
/// let (records, warnings) = reader.stream_resilient::<serde_json::Value>();
/// # let _ = (records, warnings);
/// # Ok(())
/// # }
/// ```
pub struct JsonlReader<R> {
    /// Buffered reader wrapping the underlying async reader.
    reader: BufReader<R>,
    /// Current line number (1-based counting, 0 before any lines are read).
    line_number: usize,
}

impl<R: AsyncRead + Unpin> JsonlReader<R> {
    /// Creates a new `JsonlReader` wrapping the given async reader.
    ///
    /// Line numbering uses 1-based indexing: the counter starts at 0 and
    /// increments after each line is read, so the first line read is numbered 1.
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line_number: 0,
        }
    }

    /// Creates a new `JsonlReader` with a custom buffer capacity.
    #[must_use]
    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(capacity, reader),
            line_number: 0,
        }
    }

    /// Returns the current line number.
    ///
    /// Returns 0 before any lines have been read. After reading, returns the
    /// 1-based line number of the last line read.
    #[must_use]
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Reads the next raw line, without its trailing line terminator.
    ///
    /// Returns `Ok(None)` at end of input. The line is returned as bytes so
    /// that invalid UTF-8 can be reported per line rather than aborting the
    /// whole read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the underlying reader fails.
    pub async fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = Vec::new();
        let read = self.reader.read_until(b'\n', &mut buf).await?;
        if read == 0 {
            return Ok(None);
        }
        self.line_number += 1;

        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        Ok(Some(buf))
    }

    /// Converts the reader into a resilient stream of parsed records.
    ///
    /// Each line is parsed independently. Lines that are not valid UTF-8 or
    /// do not deserialize into `T` are skipped and recorded in the returned
    /// [`WarningCollector`]; blank lines are skipped silently. The stream
    /// ends at end of input.
    ///
    /// The stream yields `Err` only when the underlying reader fails, after
    /// which it ends. The collector is shared with the stream, so warnings
    /// can be inspected while records are still being consumed.
    pub fn stream_resilient<T>(self) -> (impl Stream<Item = Result<T>>, WarningCollector)
    where
        T: DeserializeOwned,
    {
        let warnings = WarningCollector::new();
        let sink = warnings.clone();

        let records = stream::try_unfold(self, move |reader| next_record(reader, sink.clone()));

        (records, warnings)
    }

    /// Consumes the reader, returning the underlying buffered reader.
    #[must_use]
    pub fn into_inner(self) -> BufReader<R> {
        self.reader
    }
}

/// Advances `reader` to the next record that parses, recording a warning for
/// every line skipped on the way.
async fn next_record<R, T>(
    mut reader: JsonlReader<R>,
    sink: WarningCollector,
) -> Result<Option<(T, JsonlReader<R>)>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    loop {
        let Some(bytes) = reader.next_line().await? else {
            return Ok(None);
        };
        let line_number = reader.line_number();

        let line = match String::from_utf8(bytes) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(line = line_number, error = %e, "Skipping non UTF-8 line");
                sink.add(Warning::SkippedLine {
                    line_number,
                    reason: format!("invalid UTF-8: {e}"),
                });
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<T>(&line) {
            Ok(record) => return Ok(Some((record, reader))),
            Err(e) => {
                tracing::warn!(line = line_number, error = %e, "Skipping malformed JSONL line");
                sink.add(Warning::MalformedJson {
                    line_number,
                    error: e.to_string(),
                });
            }
        }
    }
}

/// Reads every parseable record from a JSONL file.
///
/// Convenience wrapper around [`JsonlReader::stream_resilient`] that collects
/// the records and warnings for a whole file.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be opened or read. Malformed lines
/// are not errors; they are returned in the warning list.
pub async fn read_jsonl_resilient<T, P>(path: P) -> Result<(Vec<T>, Vec<Warning>)>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref()).await.map_err(Error::Io)?;
    let (records, warnings) = JsonlReader::new(file).stream_resilient::<T>();
    let records: Vec<T> = std::pin::pin!(records).try_collect().await?;
    Ok((records, warnings.into_warnings()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn new_reader_starts_at_line_zero() {
        let reader = JsonlReader::new(Cursor::new(b""));
        assert_eq!(reader.line_number(), 0);
    }

    #[tokio::test]
    async fn next_line_strips_terminators_and_counts() {
        let mut reader = JsonlReader::new(Cursor::new(b"first\r\nsecond\nthird".to_vec()));

        assert_eq!(reader.next_line().await.unwrap(), Some(b"first".to_vec()));
        assert_eq!(reader.line_number(), 1);
        assert_eq!(reader.next_line().await.unwrap(), Some(b"second".to_vec()));
        assert_eq!(reader.next_line().await.unwrap(), Some(b"third".to_vec()));
        assert_eq!(reader.line_number(), 3);
        assert_eq!(reader.next_line().await.unwrap(), None);
        assert_eq!(reader.line_number(), 3);
    }

    #[tokio::test]
    async fn empty_line_is_still_counted() {
        let mut reader = JsonlReader::new(Cursor::new(b"\n\nx\n".to_vec()));

        assert_eq!(reader.next_line().await.unwrap(), Some(Vec::new()));
        assert_eq!(reader.next_line().await.unwrap(), Some(Vec::new()));
        assert_eq!(reader.next_line().await.unwrap(), Some(b"x".to_vec()));
        assert_eq!(reader.line_number(), 3);
    }

    #[test]
    fn with_capacity_creates_reader() {
        let reader = JsonlReader::with_capacity(Cursor::new(b"test data"), 8192);
        assert_eq!(reader.line_number(), 0);
        let _inner = reader.into_inner();
    }
}
