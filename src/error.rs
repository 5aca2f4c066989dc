//! Error taxonomy for the memory store.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by ingestion and storage operations.
///
/// Deduplication hits are deliberately absent: an already-ingested file or a
/// duplicate chunk hash is a `None` return, not an error.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// The ingestion source does not resolve to a readable file.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// The ingestion source is not valid UTF-8 text.
    #[error("file is not valid UTF-8 text: {0}")]
    Decode(PathBuf),

    /// Underlying SQLite failure (disk full, constraint violation, schema).
    #[error("storage failure: {0}")]
    Store(#[from] rusqlite::Error),

    /// Filesystem failure other than a missing file.
    #[error("I/O failure reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience alias for fallible memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;
