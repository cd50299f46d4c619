//! Error types for dependagraph-jsonl operations.

use std::io;
use thiserror::Error;

/// The error type for JSONL reading and writing.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred while reading or writing.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for dependagraph-jsonl operations.
pub type Result<T> = std::result::Result<T, Error>;
