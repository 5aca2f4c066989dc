//! Content chunk storage with hash-based deduplication and FTS5 search.
//!
//! Chunks are content-addressed slices of text: the SHA-256 fingerprint of
//! the text is UNIQUE, so re-inserting identical text is a no-op rather
//! than an error — even when the path or source differ. The `chunks_fts`
//! mirror is trigger-maintained like the memories mirror.

use chrono::Utc;
use rusqlite::{params, Connection, Result as SqlResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

// ── Data structures ──────────────────────────────────────────────

/// A stored content chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentChunk {
    pub id: i64,
    pub path: String,
    pub source: String,
    pub start_line: i64,
    pub end_line: i64,
    pub hash: String,
    pub text: String,
    pub updated_at: String,
}

/// Fields for a chunk insert. The hash is computed from the text.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub path: String,
    pub source: String,
    pub start_line: i64,
    pub end_line: i64,
    pub text: String,
}

/// A full-text search hit over chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkHit {
    /// Matching excerpt with `[` `]` markers around matched terms.
    pub snippet: String,
    pub source: String,
    pub path: String,
    pub score: f64,
}

// ── Schema ───────────────────────────────────────────────────────

/// Create the chunks table and its FTS5 mirror.
pub fn create_chunk_tables(conn: &Connection) -> SqlResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS chunks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            path TEXT NOT NULL,
            source TEXT NOT NULL,
            start_line INTEGER,
            end_line INTEGER,
            hash TEXT UNIQUE NOT NULL,
            text TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source);
        CREATE INDEX IF NOT EXISTS idx_chunks_path ON chunks(path);

        -- FTS5 mirror over chunk text
        CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(
            text,
            content='chunks',
            content_rowid='id'
        );

        -- FTS5 sync triggers
        CREATE TRIGGER IF NOT EXISTS chunks_ai AFTER INSERT ON chunks BEGIN
            INSERT INTO chunks_fts(rowid, text) VALUES (new.id, new.text);
        END;
        CREATE TRIGGER IF NOT EXISTS chunks_ad AFTER DELETE ON chunks BEGIN
            INSERT INTO chunks_fts(chunks_fts, rowid, text)
            VALUES ('delete', old.id, old.text);
        END;
        CREATE TRIGGER IF NOT EXISTS chunks_au AFTER UPDATE ON chunks BEGIN
            INSERT INTO chunks_fts(chunks_fts, rowid, text)
            VALUES ('delete', old.id, old.text);
            INSERT INTO chunks_fts(rowid, text) VALUES (new.id, new.text);
        END;",
    )
}

// ── Helpers ──────────────────────────────────────────────────────

/// SHA-256 fingerprint of chunk text, hex encoded.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Build an FTS5 MATCH expression from free-form user input.
///
/// Each word is quoted (stripping embedded quotes) and joined with OR, so
/// punctuation never produces FTS syntax errors and a single-term query
/// returns every true match.
pub(crate) fn build_fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|w| {
            let clean = w.replace('"', "");
            format!("\"{clean}\"")
        })
        .filter(|w| w != "\"\"")
        .collect::<Vec<_>>()
        .join(" OR ")
}

// ── Operations ───────────────────────────────────────────────────

/// Insert a chunk, deduplicating on the text fingerprint.
///
/// Returns the new id, or `None` when an identical chunk already exists.
pub fn insert_chunk(conn: &Connection, chunk: &NewChunk) -> SqlResult<Option<i64>> {
    let hash = content_hash(&chunk.text);
    let now = Utc::now().to_rfc3339();

    let inserted = conn.execute(
        "INSERT OR IGNORE INTO chunks
            (path, source, start_line, end_line, hash, text, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            chunk.path,
            chunk.source,
            chunk.start_line,
            chunk.end_line,
            hash,
            chunk.text,
            now,
        ],
    )?;

    if inserted == 0 {
        debug!(path = %chunk.path, "chunk already present, skipping");
        return Ok(None);
    }
    Ok(Some(conn.last_insert_rowid()))
}

/// Most recently updated chunks.
pub fn recent(conn: &Connection, limit: usize) -> SqlResult<Vec<ContentChunk>> {
    let mut stmt = conn.prepare(
        "SELECT id, path, source, start_line, end_line, hash, text, updated_at
         FROM chunks
         ORDER BY updated_at DESC
         LIMIT ?1",
    )?;
    #[allow(clippy::cast_possible_wrap)]
    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok(ContentChunk {
            id: row.get(0)?,
            path: row.get(1)?,
            source: row.get(2)?,
            start_line: row.get(3)?,
            end_line: row.get(4)?,
            hash: row.get(5)?,
            text: row.get(6)?,
            updated_at: row.get(7)?,
        })
    })?;
    rows.collect()
}

/// Full-text search over chunk text, returning ranked snippets.
pub fn search_chunks(conn: &Connection, query: &str, limit: usize) -> SqlResult<Vec<ChunkHit>> {
    let fts_query = build_fts_query(query);
    if fts_query.is_empty() {
        return Ok(Vec::new());
    }

    #[allow(clippy::cast_possible_wrap)]
    let limit_i64 = limit as i64;

    let mut stmt = conn.prepare(
        "SELECT snippet(chunks_fts, 0, '[', ']', '...', 8) as snip,
                c.source, c.path, bm25(chunks_fts) as score
         FROM chunks_fts
         JOIN chunks c ON c.id = chunks_fts.rowid
         WHERE chunks_fts MATCH ?1
         ORDER BY score
         LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![fts_query, limit_i64], |row| {
        let score: f64 = row.get(3)?;
        Ok(ChunkHit {
            snippet: row.get(0)?,
            source: row.get(1)?,
            path: row.get(2)?,
            score: -score, // BM25: lower = better, negate for ranking
        })
    })?;
    rows.collect()
}

/// Count stored chunks.
pub fn count_chunks(conn: &Connection) -> SqlResult<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    Ok(count as usize)
}
