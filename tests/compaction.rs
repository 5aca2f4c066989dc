//! End-to-end compaction runs against a real workspace directory.

use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

use clawmem::{CompactionConfig, CompressionStatus, MemoryStore, RecordFilter};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn write_file(dir: &Path, name: &str, content: &[u8]) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn workspace_config(dir: &TempDir) -> CompactionConfig {
    CompactionConfig {
        workspace_dir: dir.path().to_path_buf(),
        patterns: vec!["daily_*.log".to_string(), "today_thoughts*.md".to_string()],
        ..Default::default()
    }
}

#[test]
fn compaction_archives_workspace_files() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "daily_standup.log", b"worked on sqlite schema");
    write_file(dir.path(), "today_thoughts.md", b"a key insight about memory");
    write_file(dir.path(), "unrelated.txt", b"never matched");

    let mut store = MemoryStore::open(&dir.path().join("memory/memory.db")).unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    let outcome = store
        .run_compaction(&workspace_config(&dir), &mut rng)
        .unwrap();

    assert_eq!(outcome.files_compressed, 2);
    assert!(outcome.report.contains("Files compressed this run: 2"));
    assert!(outcome.report.contains("Total memories: 2"));

    let records = store.query(&RecordFilter::default()).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records
        .iter()
        .all(|r| r.compression_status == CompressionStatus::Compressed));
    assert!(records
        .iter()
        .all(|r| r.owner == "assistant" && r.original_file_path.is_some()));

    // Archived content is reachable through chunk search with a snippet.
    let hits = store.search("sqlite", 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].source, "compaction");
    assert!(hits[0].snippet.contains("[sqlite]"));
}

#[test]
fn second_run_compresses_nothing_new() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "daily_a.log", b"first day content");

    let mut store = MemoryStore::open_in_memory().unwrap();
    let config = workspace_config(&dir);

    let mut rng = StdRng::seed_from_u64(11);
    let first = store.run_compaction(&config, &mut rng).unwrap();
    assert_eq!(first.files_compressed, 1);

    write_file(dir.path(), "daily_b.log", b"second day content");
    let second = store.run_compaction(&config, &mut rng).unwrap();
    assert_eq!(second.files_compressed, 1);
    assert_eq!(store.count().unwrap(), 2);

    let third = store.run_compaction(&config, &mut rng).unwrap();
    assert_eq!(third.files_compressed, 0);
    assert_eq!(store.count().unwrap(), 2);
}

#[test]
fn unreadable_file_skipped_run_completes() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "daily_good.log", b"plain text entry");
    write_file(dir.path(), "daily_bad.log", &[0xff, 0xfe, 0x00, 0x80]);

    let mut store = MemoryStore::open_in_memory().unwrap();
    let mut rng = StdRng::seed_from_u64(5);
    let outcome = store
        .run_compaction(&workspace_config(&dir), &mut rng)
        .unwrap();

    assert_eq!(outcome.files_compressed, 1);
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn critical_records_get_access_touches() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let mut store = MemoryStore::open_in_memory().unwrap();
    for i in 0..3 {
        store
            .store(
                "jeff",
                "memory",
                &format!("critical fact number {i}"),
                None,
                None,
                Some(5),
            )
            .unwrap();
    }
    store
        .store("jeff", "note", "low importance aside", None, None, Some(2))
        .unwrap();

    let mut rng = StdRng::seed_from_u64(17);
    let outcome = store
        .run_compaction(&workspace_config(&dir), &mut rng)
        .unwrap();
    assert!(outcome.report.contains("Access patterns updated: 3"));

    let touched = store.critical("jeff", 10).unwrap();
    assert_eq!(touched.len(), 3);
    assert!(touched
        .iter()
        .all(|r| r.access_count == 1 && r.last_accessed.is_some()));

    let low = store
        .query(&RecordFilter {
            kind: Some("note"),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(low[0].access_count, 0);
}
