//! Async JSON Lines helpers.
//!
//! Reading is resilient: a line that fails to decode is reported as a
//! [`Warning`] and skipped instead of aborting the whole load. Writing comes in
//! two shapes, a durable single-record append for write-ahead logs and an
//! atomic temp-file-then-rename rewrite for compaction.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod atomic;
pub mod error;
pub mod reader;
pub mod warning;
pub mod writer;

pub use atomic::{write_jsonl_atomic, write_jsonl_atomic_iter};
pub use error::{Error, Result};
pub use reader::{JsonlReader, read_jsonl_resilient};
pub use warning::Warning;
pub use writer::{JsonlWriter, append_jsonl};
