//! SQLite-backed persistent memory for long-running assistants.
//!
//! Memories are typed, scored records with full-text search; raw workspace
//! files get archived into the store by a daily compaction job that
//! truncates, classifies, tags, and deduplicates them. Two FTS5 indexes
//! back retrieval: one over memory records, one over content chunks.
//!
//! Typical entry point is [`MemoryStore`]:
//!
//! ```no_run
//! use clawmem::{CompactionConfig, MemoryStore};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = CompactionConfig::default();
//! let mut store = MemoryStore::open(&config.resolved_db_path())?;
//! let outcome = store.run_compaction(&config, &mut rand::rng())?;
//! println!("{}", outcome.report);
//! # Ok(())
//! # }
//! ```

pub mod chunks;
pub mod classify;
pub mod compaction;
pub mod config;
pub mod error;
pub mod ingest;
pub mod records;
pub mod stats;
pub mod store;
pub mod tags;

pub use chunks::{ChunkHit, ContentChunk, NewChunk};
pub use classify::{category_for_content, classify, classify_file, kind_for_filename};
pub use compaction::{CompactionOutcome, CompactionReport};
pub use config::CompactionConfig;
pub use error::{MemoryError, MemoryResult};
pub use ingest::{IngestMode, COMPACTION_CONTENT_LIMIT, RAW_CONTENT_LIMIT};
pub use records::{
    CompressionStatus, MemoryRecord, NewRecord, RecordFilter, RecordHit,
};
pub use stats::{StatRow, StoreAggregate};
pub use store::MemoryStore;
pub use tags::extract_tags;
