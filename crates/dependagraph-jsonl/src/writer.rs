//! JSONL writing operations.

use crate::Result;
use serde::Serialize;
use std::path::Path;
use tokio::fs::OpenOptions;
use std::io::SeekFrom;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt, BufWriter};

/// Async buffered writer for JSONL data.
///
/// Each value is serialized to one line followed by `\n`. Nothing reaches the
/// underlying writer until the buffer fills or [`flush`](Self::flush) runs.
pub struct JsonlWriter<W> {
    writer: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin> JsonlWriter<W> {
    /// Creates a new `JsonlWriter` wrapping the given async writer.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
        }
    }

    /// Serializes one value as a line.
    ///
    /// # Errors
    ///
    /// Returns `Error::Json` if the value cannot be serialized (nothing is
    /// written in that case) or `Error::Io` on write failure.
    pub async fn write<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let line = encode_line(value)?;
        self.writer.write_all(&line).await?;
        Ok(())
    }

    /// Serializes every value, returning how many lines were written.
    ///
    /// # Errors
    ///
    /// Stops at the first serialization or IO failure.
    pub async fn write_all<T, I>(&mut self, values: I) -> Result<usize>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        let mut count = 0;
        for value in values {
            self.write(&value).await?;
            count += 1;
        }
        Ok(count)
    }

    /// Flushes buffered lines to the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if flushing fails.
    pub async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }

    /// Consumes the writer, returning the underlying writer.
    ///
    /// Call [`flush`](Self::flush) first; buffered lines are otherwise lost.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

/// Appends one record to a JSONL file and syncs it to disk.
///
/// The record is serialized before the file is touched and written with a
/// single `write_all`, so a serialization failure leaves the file unchanged.
/// The file is created if it does not exist.
///
/// If the file does not end in `\n` (a previous append was torn by a crash),
/// the record starts on a fresh line so the fragment cannot swallow it.
///
/// # Errors
///
/// Returns `Error::Json` on serialization failure or `Error::Io` if the file
/// cannot be opened, written, or synced.
pub async fn append_jsonl<T, P>(path: P, value: &T) -> Result<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let mut line = encode_line(value)?;
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path.as_ref())
        .await?;
    if ends_mid_line(&mut file).await? {
        line.insert(0, b'\n');
    }
    file.write_all(&line).await?;
    file.sync_data().await?;
    Ok(())
}

/// Whether a non-empty file's last byte is something other than `\n`.
async fn ends_mid_line(file: &mut File) -> Result<bool> {
    if file.metadata().await?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] != b'\n')
}

fn encode_line<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use tempfile::TempDir;

    #[derive(Serialize)]
    struct Record<'a> {
        id: u32,
        name: &'a str,
    }

    #[tokio::test]
    async fn write_all_emits_one_line_per_value() {
        let mut writer = JsonlWriter::new(Vec::new());
        let count = writer
            .write_all([Record { id: 1, name: "a" }, Record { id: 2, name: "b" }])
            .await
            .unwrap();
        writer.flush().await.unwrap();

        assert_eq!(count, 2);
        let text = String::from_utf8(writer.into_inner()).unwrap();
        assert_eq!(text, "{\"id\":1,\"name\":\"a\"}\n{\"id\":2,\"name\":\"b\"}\n");
    }

    #[tokio::test]
    async fn append_creates_then_extends_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");

        append_jsonl(&path, &Record { id: 1, name: "a" }).await.unwrap();
        append_jsonl(&path, &Record { id: 2, name: "b" }).await.unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.ends_with("\"b\"}\n"));
    }

    #[tokio::test]
    async fn append_after_torn_line_starts_a_new_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        tokio::fs::write(&path, b"{\"id\":1,\"name\":\"a\"}\n{\"id\":2,\"na")
            .await
            .unwrap();

        append_jsonl(&path, &Record { id: 3, name: "c" }).await.unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "{\"id\":2,\"na");
        assert_eq!(lines[2], "{\"id\":3,\"name\":\"c\"}");
    }

    #[tokio::test]
    async fn append_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("log.jsonl");

        let result = append_jsonl(&path, &Record { id: 1, name: "a" }).await;
        assert!(matches!(result, Err(crate::Error::Io(_))));
    }
}
