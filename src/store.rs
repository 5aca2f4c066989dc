//! Store handle: connection lifecycle, schema setup, and the operation
//! surface exposed to surrounding tooling.
//!
//! One `MemoryStore` is opened at process start, threaded explicitly to
//! whatever needs persistence, and closed on drop. There is no global
//! connection; the store assumes a single active writer.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use rand::Rng;
use rusqlite::{Connection, Transaction};
use tracing::debug;

use crate::chunks::{self, ChunkHit, ContentChunk, NewChunk};
use crate::compaction::{self, CompactionOutcome};
use crate::config::CompactionConfig;
use crate::error::{MemoryError, MemoryResult};
use crate::ingest::{self, IngestMode};
use crate::records::{
    self, CompressionStatus, MemoryRecord, NewRecord, RecordFilter, RecordHit,
};
use crate::stats::{self, StatRow};

/// Handle to the memory database.
pub struct MemoryStore {
    conn: Connection,
}

impl MemoryStore {
    /// Open (creating if absent) the memory database at `path`.
    ///
    /// Parent directories are created as needed. Safe to call on every
    /// process start: schema creation and migrations are idempotent.
    pub fn open(path: &Path) -> MemoryResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| MemoryError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened memory database");
        Self::init(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> MemoryResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> MemoryResult<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        records::create_memory_tables(&conn)?;
        records::apply_migrations(&conn)?;
        chunks::create_chunk_tables(&conn)?;
        Ok(Self { conn })
    }

    /// Borrow the underlying connection for read-path tooling.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn transaction(&mut self) -> rusqlite::Result<Transaction<'_>> {
        self.conn.transaction()
    }

    // ── Write surface ───────────────────────────────────────────

    /// Store a memory directly (no file provenance, born raw).
    ///
    /// Importance defaults to 1 and is clamped to [1,5] either way.
    pub fn store(
        &self,
        owner: &str,
        kind: &str,
        content: &str,
        category: Option<&str>,
        tags: Option<&[String]>,
        importance: Option<u8>,
    ) -> MemoryResult<i64> {
        let tags: BTreeSet<String> = tags
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default();

        let id = records::insert_record(
            &self.conn,
            &NewRecord {
                owner: owner.to_string(),
                kind: kind.to_string(),
                content: content.to_string(),
                category: category.map(str::to_string),
                tags,
                importance: importance.unwrap_or(1),
                compression_status: CompressionStatus::Raw,
                original_file_path: None,
            },
        )?;
        Ok(id)
    }

    /// Insert a content chunk; `None` means an identical chunk exists.
    pub fn insert_chunk(&self, chunk: &NewChunk) -> MemoryResult<Option<i64>> {
        Ok(chunks::insert_chunk(&self.conn, chunk)?)
    }

    /// Import a file as a raw memory, deduplicating on its path.
    pub fn ingest_file(
        &self,
        path: &Path,
        owner: &str,
        importance_hint: Option<u8>,
    ) -> MemoryResult<Option<i64>> {
        ingest::ingest_file(&self.conn, path, owner, IngestMode::Raw, importance_hint)
    }

    /// Run the daily compaction job over the configured workspace.
    pub fn run_compaction<R: Rng>(
        &mut self,
        config: &CompactionConfig,
        rng: &mut R,
    ) -> anyhow::Result<CompactionOutcome> {
        compaction::run(self, config, rng)
    }

    // ── Read surface ────────────────────────────────────────────

    /// Full-text search over archived chunks, returning ranked snippets.
    pub fn search(&self, term: &str, limit: usize) -> MemoryResult<Vec<ChunkHit>> {
        Ok(chunks::search_chunks(&self.conn, term, limit)?)
    }

    /// Full-text search over memory records (content and tags).
    pub fn search_records(&self, term: &str, limit: usize) -> MemoryResult<Vec<RecordHit>> {
        Ok(records::search_records(&self.conn, term, limit)?)
    }

    /// Most recently updated chunks.
    pub fn recent(&self, limit: usize) -> MemoryResult<Vec<ContentChunk>> {
        Ok(chunks::recent(&self.conn, limit)?)
    }

    /// Filtered record listing, newest-first then most-important-first.
    pub fn query(&self, filter: &RecordFilter) -> MemoryResult<Vec<MemoryRecord>> {
        Ok(records::query(&self.conn, filter)?)
    }

    /// Records with importance >= 4 for an owner.
    pub fn critical(&self, owner: &str, limit: usize) -> MemoryResult<Vec<MemoryRecord>> {
        Ok(records::critical(&self.conn, owner, limit)?)
    }

    /// Grouped statistics, optionally restricted to one owner.
    pub fn stats_report(&self, owner: Option<&str>) -> MemoryResult<Vec<StatRow>> {
        Ok(stats::stats(&self.conn, owner)?)
    }

    /// Total stored records.
    pub fn count(&self) -> MemoryResult<usize> {
        Ok(records::count_records(&self.conn)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    #[test]
    fn open_creates_parent_dirs_and_reopens() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("memory").join("memory.db");

        {
            let store = MemoryStore::open(&db_path).unwrap();
            store
                .store("jeff", "thought", "persistent thought", None, None, Some(4))
                .unwrap();
        }

        // Reopen: schema setup must be idempotent and data durable.
        let store = MemoryStore::open(&db_path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
        let records = store.query(&RecordFilter::default()).unwrap();
        assert_eq!(records[0].content, "persistent thought");
    }

    #[test]
    fn store_defaults_importance_to_one() {
        let store = MemoryStore::open_in_memory().unwrap();
        store
            .store("jeff", "note", "unrated content", None, None, None)
            .unwrap();
        let records = store.query(&RecordFilter::default()).unwrap();
        assert_eq!(records[0].importance, 1);
    }

    #[test]
    fn stored_record_round_trips_through_search_and_stats() {
        let store = MemoryStore::open_in_memory().unwrap();
        let tags = vec!["sqlite".to_string(), "memory".to_string()];
        store
            .store(
                "jeff",
                "insight",
                "memory partitioning enables multi-relationship assistants",
                Some("architecture"),
                Some(&tags),
                Some(4),
            )
            .unwrap();

        let hits = store.search_records("partitioning", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.tags, vec!["memory", "sqlite"]);

        let rows = store.stats_report(Some("jeff")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, "insight");
        assert_eq!(rows[0].count, 1);
        assert!((rows[0].avg_importance - 4.0).abs() < f64::EPSILON);
        assert_eq!(rows[0].critical_count, 1);
    }

    #[test]
    fn chunk_surface_search_and_recent() {
        let store = MemoryStore::open_in_memory().unwrap();
        store
            .insert_chunk(&NewChunk {
                path: "insights.md".to_string(),
                source: "daily".to_string(),
                start_line: 1,
                end_line: 1,
                text: "sqlite migration learnings today".to_string(),
            })
            .unwrap();

        let hits = store.search("migration", 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "insights.md");

        let recent = store.recent(5).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].source, "daily");
    }

    #[test]
    fn compaction_over_empty_workspace_reports_and_succeeds() {
        let dir = TempDir::new().unwrap();
        let mut store = MemoryStore::open_in_memory().unwrap();
        store
            .store("jeff", "memory", "pre-existing critical fact", None, None, Some(5))
            .unwrap();

        let config = CompactionConfig {
            workspace_dir: dir.path().to_path_buf(),
            patterns: vec!["daily_*.log".to_string()],
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let outcome = store.run_compaction(&config, &mut rng).unwrap();

        assert_eq!(outcome.files_compressed, 0);
        assert!(outcome.report.contains("Total memories: 1"));
        assert!(outcome.report.contains("Files compressed this run: 0"));
    }
}
