//! Read-only statistics over the memory store.

use rusqlite::{params, Connection, Result as SqlResult};
use serde::{Deserialize, Serialize};

// ── Data structures ──────────────────────────────────────────────

/// One grouped statistics row.
///
/// Grouping is (kind, compression status), additionally split by owner
/// when no owner filter is given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatRow {
    pub owner: Option<String>,
    pub kind: String,
    pub compression_status: String,
    pub count: i64,
    pub avg_importance: f64,
    pub total_accesses: i64,
    pub critical_count: i64,
}

/// Whole-store aggregate used by the compaction report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StoreAggregate {
    pub total_records: i64,
    pub compressed_count: i64,
    pub critical_count: i64,
    pub avg_importance: f64,
}

// ── Queries ──────────────────────────────────────────────────────

/// Grouped record statistics, optionally restricted to one owner.
pub fn stats(conn: &Connection, owner: Option<&str>) -> SqlResult<Vec<StatRow>> {
    let mut rows = Vec::new();

    if let Some(owner) = owner {
        let mut stmt = conn.prepare(
            "SELECT kind, compression_status, COUNT(*),
                    AVG(importance), COALESCE(SUM(access_count), 0),
                    COUNT(CASE WHEN importance >= 4 THEN 1 END)
             FROM memories
             WHERE owner = ?1
             GROUP BY kind, compression_status
             ORDER BY kind, compression_status",
        )?;
        let mapped = stmt.query_map(params![owner], |row| {
            Ok(StatRow {
                owner: None,
                kind: row.get(0)?,
                compression_status: row.get(1)?,
                count: row.get(2)?,
                avg_importance: row.get(3)?,
                total_accesses: row.get(4)?,
                critical_count: row.get(5)?,
            })
        })?;
        for row in mapped {
            rows.push(row?);
        }
    } else {
        let mut stmt = conn.prepare(
            "SELECT owner, kind, compression_status, COUNT(*),
                    AVG(importance), COALESCE(SUM(access_count), 0),
                    COUNT(CASE WHEN importance >= 4 THEN 1 END)
             FROM memories
             GROUP BY owner, kind, compression_status
             ORDER BY owner, kind, compression_status",
        )?;
        let mapped = stmt.query_map([], |row| {
            Ok(StatRow {
                owner: Some(row.get(0)?),
                kind: row.get(1)?,
                compression_status: row.get(2)?,
                count: row.get(3)?,
                avg_importance: row.get(4)?,
                total_accesses: row.get(5)?,
                critical_count: row.get(6)?,
            })
        })?;
        for row in mapped {
            rows.push(row?);
        }
    }

    Ok(rows)
}

/// Whole-store aggregate counts for reporting.
pub fn aggregate(conn: &Connection) -> SqlResult<StoreAggregate> {
    conn.query_row(
        "SELECT COUNT(*),
                COUNT(CASE WHEN compression_status = 'compressed' THEN 1 END),
                COUNT(CASE WHEN importance >= 4 THEN 1 END),
                COALESCE(AVG(importance), 0.0)
         FROM memories",
        [],
        |row| {
            Ok(StoreAggregate {
                total_records: row.get(0)?,
                compressed_count: row.get(1)?,
                critical_count: row.get(2)?,
                avg_importance: row.get(3)?,
            })
        },
    )
}
