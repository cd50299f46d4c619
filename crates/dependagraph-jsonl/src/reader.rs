//! JSONL reading operations.

use crate::{Result, Warning};
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Async line reader for JSONL data.
///
/// Tracks the 1-based number of the last line read so callers can point at
/// the offending line when a record fails to decode.
pub struct JsonlReader<R> {
    reader: BufReader<R>,
    line_number: usize,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> JsonlReader<R> {
    /// Creates a new `JsonlReader` wrapping the given async reader.
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line_number: 0,
            buf: Vec::new(),
        }
    }

    /// Returns the number of the last line read, or 0 before the first read.
    #[must_use]
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Reads the next raw line without its terminator.
    ///
    /// Returns `Ok(None)` at end of input. A final line without a trailing
    /// newline is still returned.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the underlying reader fails.
    pub async fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        self.buf.clear();
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 {
            return Ok(None);
        }
        self.line_number += 1;

        let mut line = std::mem::take(&mut self.buf);
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }

    /// Decodes every remaining line, collecting undecodable lines as warnings.
    ///
    /// Blank lines are ignored without a warning.
    ///
    /// # Errors
    ///
    /// Only IO failures are errors; decoding problems become [`Warning`]s.
    pub async fn read_resilient<T: DeserializeOwned>(&mut self) -> Result<(Vec<T>, Vec<Warning>)> {
        let mut values = Vec::new();
        let mut warnings = Vec::new();

        while let Some(raw) = self.next_line().await? {
            let line_number = self.line_number;
            let text = match String::from_utf8(raw) {
                Ok(text) => text,
                Err(e) => {
                    warnings.push(Warning::SkippedLine {
                        line_number,
                        reason: format!("invalid UTF-8: {e}"),
                    });
                    continue;
                }
            };

            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<T>(trimmed) {
                Ok(value) => values.push(value),
                Err(e) => {
                    tracing::debug!(line_number, error = %e, "Skipping malformed JSONL line");
                    warnings.push(Warning::MalformedJson {
                        line_number,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok((values, warnings))
    }
}

/// Reads a whole JSONL file, skipping lines that fail to decode.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be opened or read.
pub async fn read_jsonl_resilient<T, P>(path: P) -> Result<(Vec<T>, Vec<Warning>)>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref()).await?;
    JsonlReader::new(file).read_resilient().await
}
