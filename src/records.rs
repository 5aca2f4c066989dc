//! Memory record storage: schema, additive migrations, insert/query, and
//! FTS5 search over record content and tags.
//!
//! The `memories_fts` mirror is an external-content FTS5 table kept in
//! sync by triggers, so a record insert and its index entry are a single
//! SQLite statement — the mirror can never drift from the table.

use std::collections::BTreeSet;

use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, Result as SqlResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::{IMPORTANCE_MAX, IMPORTANCE_MIN};

// ── Data structures ──────────────────────────────────────────────

/// Lifecycle tag of a record, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionStatus {
    /// Freshly stored content.
    Raw,
    /// Produced by the compaction job from an external file.
    Compressed,
}

impl CompressionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CompressionStatus::Raw => "raw",
            CompressionStatus::Compressed => "compressed",
        }
    }
}

fn parse_status(s: &str) -> CompressionStatus {
    if s == "compressed" {
        CompressionStatus::Compressed
    } else {
        CompressionStatus::Raw
    }
}

/// A stored memory record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: i64,
    pub timestamp: String,
    pub owner: String,
    pub kind: String,
    pub content: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub importance: u8,
    pub compression_status: CompressionStatus,
    pub original_file_path: Option<String>,
    pub access_count: i64,
    pub last_accessed: Option<String>,
    pub created_at: Option<String>,
}

/// Fields for a record insert. The store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub owner: String,
    pub kind: String,
    pub content: String,
    pub category: Option<String>,
    pub tags: BTreeSet<String>,
    pub importance: u8,
    pub compression_status: CompressionStatus,
    pub original_file_path: Option<String>,
}

/// Optional filters for [`query`].
#[derive(Debug, Clone)]
pub struct RecordFilter<'a> {
    pub owner: Option<&'a str>,
    pub kind: Option<&'a str>,
    pub category: Option<&'a str>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for RecordFilter<'_> {
    fn default() -> Self {
        Self {
            owner: None,
            kind: None,
            category: None,
            limit: 10,
            offset: 0,
        }
    }
}

/// A full-text search hit over records.
#[derive(Debug, Clone)]
pub struct RecordHit {
    pub record: MemoryRecord,
    pub score: f64,
}

// ── Schema ───────────────────────────────────────────────────────

/// Schema version after all known migrations.
const SCHEMA_VERSION: i32 = 2;

/// Ordered additive migrations: (version, guard column, ALTER statement).
///
/// Applied at open when `PRAGMA user_version` is behind. The guard column
/// check makes the step idempotent even on databases that predate schema
/// versioning.
const MIGRATIONS: &[(i32, &str, &str)] = &[
    (
        1,
        "compression_status",
        "ALTER TABLE memories ADD COLUMN compression_status TEXT NOT NULL DEFAULT 'raw'",
    ),
    (
        2,
        "original_file_path",
        "ALTER TABLE memories ADD COLUMN original_file_path TEXT",
    ),
];

/// Create the memories table, its indexes, and the FTS5 mirror.
pub fn create_memory_tables(conn: &Connection) -> SqlResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS memories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            owner TEXT NOT NULL,
            kind TEXT NOT NULL,
            content TEXT NOT NULL,
            category TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            importance INTEGER NOT NULL DEFAULT 1,
            access_count INTEGER NOT NULL DEFAULT 0,
            last_accessed TEXT,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP
        );
        CREATE INDEX IF NOT EXISTS idx_memories_owner_kind ON memories(owner, kind);
        CREATE INDEX IF NOT EXISTS idx_memories_timestamp ON memories(timestamp);
        CREATE INDEX IF NOT EXISTS idx_memories_category ON memories(category);

        -- FTS5 mirror over content and tags
        CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
            content, tags,
            content='memories',
            content_rowid='id'
        );

        -- FTS5 sync triggers
        CREATE TRIGGER IF NOT EXISTS memories_ai AFTER INSERT ON memories BEGIN
            INSERT INTO memories_fts(rowid, content, tags)
            VALUES (new.id, new.content, new.tags);
        END;
        CREATE TRIGGER IF NOT EXISTS memories_ad AFTER DELETE ON memories BEGIN
            INSERT INTO memories_fts(memories_fts, rowid, content, tags)
            VALUES ('delete', old.id, old.content, old.tags);
        END;
        CREATE TRIGGER IF NOT EXISTS memories_au AFTER UPDATE ON memories BEGIN
            INSERT INTO memories_fts(memories_fts, rowid, content, tags)
            VALUES ('delete', old.id, old.content, old.tags);
            INSERT INTO memories_fts(rowid, content, tags)
            VALUES (new.id, new.content, new.tags);
        END;",
    )
}

/// Apply pending additive migrations and stamp the schema version.
pub fn apply_migrations(conn: &Connection) -> SqlResult<()> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    for (migration_version, column, sql) in MIGRATIONS {
        if *migration_version <= version {
            continue;
        }
        if !column_exists(conn, "memories", column)? {
            conn.execute(sql, [])?;
            debug!(column, version = migration_version, "added memories column");
        }
    }

    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> SqlResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

// ── Operations ───────────────────────────────────────────────────

/// Insert a memory record. Importance is clamped to [1,5] on write.
///
/// The FTS mirror entry is created by trigger in the same statement.
pub fn insert_record(conn: &Connection, rec: &NewRecord) -> SqlResult<i64> {
    let timestamp = Utc::now().to_rfc3339();
    let tags_json =
        serde_json::to_string(&rec.tags).unwrap_or_else(|_| String::from("[]"));
    let importance = rec.importance.clamp(IMPORTANCE_MIN, IMPORTANCE_MAX);

    conn.execute(
        "INSERT INTO memories
            (timestamp, owner, kind, content, category, tags, importance,
             compression_status, original_file_path)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            timestamp,
            rec.owner,
            rec.kind,
            rec.content,
            rec.category,
            tags_json,
            importance,
            rec.compression_status.as_str(),
            rec.original_file_path,
        ],
    )?;

    let id = conn.last_insert_rowid();
    debug!(id, kind = %rec.kind, importance, "stored memory record");
    Ok(id)
}

const RECORD_COLUMNS: &str = "id, timestamp, owner, kind, content, category, tags, importance,
     compression_status, original_file_path, access_count, last_accessed, created_at";

/// Query records with optional filters, newest-first then most-important-first.
pub fn query(conn: &Connection, filter: &RecordFilter) -> SqlResult<Vec<MemoryRecord>> {
    let mut sql = format!("SELECT {RECORD_COLUMNS} FROM memories");
    let mut clauses = Vec::new();
    let mut binds: Vec<&str> = Vec::new();

    if let Some(owner) = filter.owner {
        clauses.push("owner = ?");
        binds.push(owner);
    }
    if let Some(kind) = filter.kind {
        clauses.push("kind = ?");
        binds.push(kind);
    }
    if let Some(category) = filter.category {
        clauses.push("category = ?");
        binds.push(category);
    }

    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(&format!(
        " ORDER BY timestamp DESC, importance DESC LIMIT {} OFFSET {}",
        filter.limit, filter.offset
    ));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(binds), row_to_record)?;
    rows.collect()
}

/// Look up the record previously created for `path`, if any.
///
/// `original_file_path` is the natural dedup key: at most one record may
/// ever exist for a given path.
pub fn find_by_path(conn: &Connection, path: &str) -> SqlResult<Option<i64>> {
    let mut stmt =
        conn.prepare("SELECT id FROM memories WHERE original_file_path = ?1 LIMIT 1")?;
    let mut rows = stmt.query_map(params![path], |row| row.get(0))?;
    rows.next().transpose()
}

/// Records with importance >= 4, most important and most recent first.
pub fn critical(conn: &Connection, owner: &str, limit: usize) -> SqlResult<Vec<MemoryRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM memories
         WHERE owner = ?1 AND importance >= 4
         ORDER BY importance DESC, timestamp DESC
         LIMIT ?2"
    ))?;
    #[allow(clippy::cast_possible_wrap)]
    let rows = stmt.query_map(params![owner, limit as i64], row_to_record)?;
    rows.collect()
}

/// Ids of all records with importance >= 4 (access-pattern candidates).
pub fn critical_ids(conn: &Connection) -> SqlResult<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM memories WHERE importance >= 4 ORDER BY id")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    rows.collect()
}

/// Increment `access_count` and stamp `last_accessed` for the given ids.
///
/// The only mutation the store permits after a record is created.
pub fn touch_access(conn: &Connection, ids: &[i64]) -> SqlResult<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let now = Utc::now().to_rfc3339();
    let placeholders = ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    conn.execute(
        &format!(
            "UPDATE memories
             SET access_count = access_count + 1, last_accessed = ?1
             WHERE id IN ({placeholders})"
        ),
        params![now],
    )
}

/// Full-text search over record content and tags, best matches first.
pub fn search_records(conn: &Connection, query: &str, limit: usize) -> SqlResult<Vec<RecordHit>> {
    let fts_query = crate::chunks::build_fts_query(query);
    if fts_query.is_empty() {
        return Ok(Vec::new());
    }

    #[allow(clippy::cast_possible_wrap)]
    let limit_i64 = limit as i64;

    let mut stmt = conn.prepare(
        "SELECT m.id, m.timestamp, m.owner, m.kind, m.content, m.category, m.tags,
                m.importance, m.compression_status, m.original_file_path,
                m.access_count, m.last_accessed, m.created_at,
                bm25(memories_fts) as score
         FROM memories_fts
         JOIN memories m ON m.id = memories_fts.rowid
         WHERE memories_fts MATCH ?1
         ORDER BY score
         LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![fts_query, limit_i64], |row| {
        let record = row_to_record(row)?;
        let score: f64 = row.get(13)?;
        Ok(RecordHit {
            record,
            score: -score, // BM25: lower = better, negate for ranking
        })
    })?;
    rows.collect()
}

/// Count all records.
pub fn count_records(conn: &Connection) -> SqlResult<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    Ok(count as usize)
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryRecord> {
    let tags_json: String = row.get(6)?;
    let status: String = row.get(8)?;
    let importance: i64 = row.get(7)?;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let importance = importance.clamp(1, 5) as u8;

    Ok(MemoryRecord {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        owner: row.get(2)?,
        kind: row.get(3)?,
        content: row.get(4)?,
        category: row.get(5)?,
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        importance,
        compression_status: parse_status(&status),
        original_file_path: row.get(9)?,
        access_count: row.get(10)?,
        last_accessed: row.get(11)?,
        created_at: row.get(12)?,
    })
}
