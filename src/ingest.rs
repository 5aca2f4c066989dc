//! Deduplicating file ingestion.
//!
//! Converts an external file into a memory record exactly once, keyed by
//! the file's path. Content is truncated to a mode-specific bound before
//! classification so the stored text, its tags, and its FTS entries always
//! describe the same bytes.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::chunks::{self, NewChunk};
use crate::classify;
use crate::error::{MemoryError, MemoryResult};
use crate::records::{self, CompressionStatus, NewRecord};
use crate::tags;

// ── Modes ────────────────────────────────────────────────────────

/// Character bound for direct imports.
pub const RAW_CONTENT_LIMIT: usize = 5_000;

/// Character bound for compaction imports (tighter: archived content).
pub const COMPACTION_CONTENT_LIMIT: usize = 2_000;

/// Chunk provenance marker for compaction imports.
const COMPACTION_SOURCE: &str = "compaction";

/// How a file enters the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
    /// Direct import: generous bound, records born `raw`.
    Raw,
    /// Compaction import: tight bound, records born `compressed`, and a
    /// content chunk is written alongside the record.
    Compaction,
}

impl IngestMode {
    fn content_limit(self) -> usize {
        match self {
            IngestMode::Raw => RAW_CONTENT_LIMIT,
            IngestMode::Compaction => COMPACTION_CONTENT_LIMIT,
        }
    }

    fn status(self) -> CompressionStatus {
        match self {
            IngestMode::Raw => CompressionStatus::Raw,
            IngestMode::Compaction => CompressionStatus::Compressed,
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────

/// Truncate to at most `limit` characters on a char boundary.
fn truncate_chars(content: &str, limit: usize) -> &str {
    match content.char_indices().nth(limit) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

fn read_text(path: &Path) -> MemoryResult<String> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => MemoryError::NotFound(path.to_path_buf()),
        _ => MemoryError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    String::from_utf8(bytes).map_err(|_| MemoryError::Decode(path.to_path_buf()))
}

// ── Pipeline ─────────────────────────────────────────────────────

/// Ingest a file into the store.
///
/// Returns the new record id, or `None` when a record for this path
/// already exists — re-running ingestion over the same file set is an
/// idempotent no-op. A missing file is [`MemoryError::NotFound`];
/// non-UTF-8 content is [`MemoryError::Decode`].
///
/// For [`IngestMode::Raw`], `importance_hint` only ever raises the
/// computed score, never lowers it.
pub fn ingest_file(
    conn: &Connection,
    path: &Path,
    owner: &str,
    mode: IngestMode,
    importance_hint: Option<u8>,
) -> MemoryResult<Option<i64>> {
    if !path.is_file() {
        return Err(MemoryError::NotFound(path.to_path_buf()));
    }

    let path_str = path.to_string_lossy().to_string();
    if records::find_by_path(conn, &path_str)?.is_some() {
        debug!(path = %path_str, "already ingested, skipping");
        return Ok(None);
    }

    let full_text = read_text(path)?;
    let content = truncate_chars(&full_text, mode.content_limit());

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let kind = classify::kind_for_filename(&filename);
    let category = classify::category_for_content(content);
    let importance = match mode {
        IngestMode::Raw => {
            let auto = classify::classify(content, kind, category);
            importance_hint.unwrap_or(0).max(auto)
        }
        IngestMode::Compaction => classify::classify_file(&filename, content),
    };
    let tag_set = tags::extract_tags(content);

    let record = NewRecord {
        owner: owner.to_string(),
        kind: kind.to_string(),
        content: content.to_string(),
        category: Some(category.to_string()),
        tags: tag_set,
        importance,
        compression_status: mode.status(),
        original_file_path: Some(path_str.clone()),
    };
    let id = records::insert_record(conn, &record)?;

    if mode == IngestMode::Compaction {
        #[allow(clippy::cast_possible_wrap)]
        let end_line = content.lines().count().max(1) as i64;
        chunks::insert_chunk(
            conn,
            &NewChunk {
                path: path_str.clone(),
                source: COMPACTION_SOURCE.to_string(),
                start_line: 1,
                end_line,
                text: content.to_string(),
            },
        )?;
    }

    info!(path = %path_str, kind, importance, "ingested file");
    Ok(Some(id))
}
