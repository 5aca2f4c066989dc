//! Daily compaction job.
//!
//! Discovers newly produced workspace files, archives them through the
//! ingestion pipeline, touches access statistics on a random sample of
//! critical records, and renders a summary report. All writes from one
//! run land in a single transaction: a run that dies mid-way leaves no
//! partial state behind.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate, Utc};
use rand::{Rng, RngExt};
use tracing::{debug, info, warn};

use crate::config::CompactionConfig;
use crate::error::MemoryError;
use crate::ingest::{self, IngestMode};
use crate::records;
use crate::stats::{self, StoreAggregate};
use crate::store::MemoryStore;

// ── Data structures ──────────────────────────────────────────────

/// Result of one compaction run.
#[derive(Debug, Clone)]
pub struct CompactionOutcome {
    /// Files newly archived this run (dedup hits and skipped files excluded).
    pub files_compressed: usize,
    /// Rendered summary report.
    pub report: String,
}

/// Aggregates behind the rendered report.
#[derive(Debug, Clone)]
pub struct CompactionReport {
    pub date: NaiveDate,
    pub files_compressed: usize,
    pub access_touched: usize,
    pub aggregate: StoreAggregate,
}

impl CompactionReport {
    /// Render the fixed-format summary text.
    pub fn render(&self) -> String {
        format!(
            "=== Memory Compression Report ===\n\
             Date: {date}\n\
             \n\
             Run results:\n\
             - Files compressed this run: {files}\n\
             - Access patterns updated: {touched}\n\
             \n\
             Database statistics:\n\
             - Total memories: {total}\n\
             - Compressed memories: {compressed}\n\
             - Critical memories (importance >= 4): {critical}\n\
             - Average importance: {avg:.1}\n\
             \n\
             Forgetting noise enables remembering signal.\n",
            date = self.date,
            files = self.files_compressed,
            touched = self.access_touched,
            total = self.aggregate.total_records,
            compressed = self.aggregate.compressed_count,
            critical = self.aggregate.critical_count,
            avg = self.aggregate.avg_importance,
        )
    }
}

// ── Discovery ────────────────────────────────────────────────────

/// Default candidate patterns for daily files produced on `yesterday`.
pub fn default_patterns(yesterday: NaiveDate) -> Vec<String> {
    vec![
        format!("*{}*", yesterday.format("%Y-%m-%d")),
        format!("*{}*", yesterday.format("%Y%m%d")),
        "today_thoughts*.md".to_string(),
        "daily_*.log".to_string(),
        "security/logs/*.log".to_string(),
    ]
}

/// Resolve glob patterns against the workspace directory.
///
/// Errors on a single pattern or entry are logged and skipped; discovery
/// never aborts the run.
fn discover(workspace_dir: &Path, patterns: &[String]) -> Vec<PathBuf> {
    let mut results = Vec::new();

    for pattern in patterns {
        let full_pattern = workspace_dir.join(pattern);
        let pattern_str = full_pattern.to_string_lossy().to_string();

        match glob::glob(&pattern_str) {
            Ok(entries) => {
                for entry in entries {
                    match entry {
                        Ok(path) if path.is_file() => results.push(path),
                        Ok(_) => {} // skip directories
                        Err(e) => {
                            debug!("Glob entry error for pattern '{pattern}': {e}");
                        }
                    }
                }
            }
            Err(e) => {
                warn!("Invalid glob pattern '{pattern}': {e}");
            }
        }
    }

    results.sort();
    results.dedup();
    results
}

// ── Access-pattern sampling ──────────────────────────────────────

/// Pick up to `n` ids uniformly without replacement.
fn sample_ids<R: Rng>(rng: &mut R, mut ids: Vec<i64>, n: usize) -> Vec<i64> {
    let take = n.min(ids.len());
    for i in 0..take {
        let j = rng.random_range(i..ids.len());
        ids.swap(i, j);
    }
    ids.truncate(take);
    ids
}

// ── Job ──────────────────────────────────────────────────────────

/// Run one compaction pass over the workspace.
///
/// Per-file failures (unreadable, non-text) are logged and counted as not
/// compressed; the batch always completes. Store-level failures abort the
/// run and roll back everything.
pub fn run<R: Rng>(
    store: &mut MemoryStore,
    config: &CompactionConfig,
    rng: &mut R,
) -> Result<CompactionOutcome> {
    let today = Utc::now().date_naive();
    let yesterday = today
        .checked_sub_days(Days::new(1))
        .unwrap_or(today);

    let patterns = if config.patterns.is_empty() {
        default_patterns(yesterday)
    } else {
        config.patterns.clone()
    };

    let owner = config.owner.clone();
    let sample_size = config.access_sample_size;
    let candidates = discover(&config.workspace_dir, &patterns);
    info!(candidates = candidates.len(), "compaction discovery complete");

    let tx = store.transaction()?;
    let mut files_compressed = 0usize;

    for path in &candidates {
        match ingest::ingest_file(&tx, path, &owner, IngestMode::Compaction, None) {
            Ok(Some(_)) => files_compressed += 1,
            Ok(None) => debug!(path = %path.display(), "already compressed"),
            Err(MemoryError::Store(e)) => {
                return Err(e).with_context(|| {
                    format!("store failure compressing {}", path.display())
                });
            }
            Err(e) => warn!(path = %path.display(), "skipping file: {e}"),
        }
    }

    let critical = records::critical_ids(&tx)?;
    let picked = sample_ids(rng, critical, sample_size);
    let access_touched = records::touch_access(&tx, &picked)?;
    debug!(access_touched, "updated access patterns");

    let aggregate = stats::aggregate(&tx)?;
    let report = CompactionReport {
        date: today,
        files_compressed,
        access_touched,
        aggregate,
    };
    let rendered = report.render();

    tx.commit().context("failed to commit compaction run")?;
    info!(files_compressed, "compaction run committed");

    Ok(CompactionOutcome {
        files_compressed,
        report: rendered,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    // ── default_patterns ────────────────────────────────────────

    #[test]
    fn default_patterns_cover_dated_and_daily_files() {
        let day = NaiveDate::from_ymd_opt(2026, 8, 22).unwrap();
        let patterns = default_patterns(day);
        assert!(patterns.contains(&"*2026-08-22*".to_string()));
        assert!(patterns.contains(&"*20260822*".to_string()));
        assert!(patterns.contains(&"daily_*.log".to_string()));
    }

    // ── discover ────────────────────────────────────────────────

    #[test]
    fn discover_matches_and_sorts() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "daily_b.log", "b");
        write_file(dir.path(), "daily_a.log", "a");
        write_file(dir.path(), "notes.md", "not a candidate");

        let found = discover(dir.path(), &["daily_*.log".to_string()]);
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("daily_a.log"));
    }

    #[test]
    fn discover_dedups_across_patterns() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "daily_2026-08-22.log", "x");

        let found = discover(
            dir.path(),
            &["daily_*.log".to_string(), "*2026-08-22*".to_string()],
        );
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn discover_subdirectory_pattern() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "security/logs/audit.log", "entries");

        let found = discover(dir.path(), &["security/logs/*.log".to_string()]);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn discover_invalid_pattern_not_fatal() {
        let dir = TempDir::new().unwrap();
        let found = discover(dir.path(), &["[invalid".to_string()]);
        assert!(found.is_empty());
    }

    #[test]
    fn discover_skips_directories() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("daily_stuff")).unwrap();
        let found = discover(dir.path(), &["daily_*".to_string()]);
        assert!(found.is_empty());
    }

    // ── sample_ids ──────────────────────────────────────────────

    #[test]
    fn sample_smaller_population_takes_all() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut picked = sample_ids(&mut rng, vec![1, 2, 3], 5);
        picked.sort_unstable();
        assert_eq!(picked, vec![1, 2, 3]);
    }

    #[test]
    fn sample_is_without_replacement() {
        let mut rng = StdRng::seed_from_u64(42);
        let picked = sample_ids(&mut rng, (1..=100).collect(), 10);
        assert_eq!(picked.len(), 10);
        let mut sorted = picked.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 10);
    }

    #[test]
    fn sample_deterministic_for_seed() {
        let ids: Vec<i64> = (1..=20).collect();
        let mut rng_a = StdRng::seed_from_u64(9);
        let mut rng_b = StdRng::seed_from_u64(9);
        assert_eq!(
            sample_ids(&mut rng_a, ids.clone(), 5),
            sample_ids(&mut rng_b, ids, 5)
        );
    }

    #[test]
    fn sample_empty_population() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(sample_ids(&mut rng, Vec::new(), 5).is_empty());
    }

    // ── report ──────────────────────────────────────────────────

    #[test]
    fn report_renders_fixed_format() {
        let report = CompactionReport {
            date: NaiveDate::from_ymd_opt(2026, 8, 23).unwrap(),
            files_compressed: 2,
            access_touched: 5,
            aggregate: StoreAggregate {
                total_records: 10,
                compressed_count: 4,
                critical_count: 3,
                avg_importance: 3.25,
            },
        };
        let text = report.render();
        assert!(text.contains("=== Memory Compression Report ==="));
        assert!(text.contains("Date: 2026-08-23"));
        assert!(text.contains("Files compressed this run: 2"));
        assert!(text.contains("Total memories: 10"));
        assert!(text.contains("Average importance: 3.2"));
    }
}
