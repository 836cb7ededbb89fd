//! Durable per-application statistics
//!
//! One SQLite row per (application, combination) pair. Rows are created on
//! first press and incremented in place afterwards; nothing but
//! [`StatsStore::clear_all`] ever removes them.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS key_statistics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        app_name TEXT NOT NULL,
        key_combination TEXT NOT NULL,
        press_count INTEGER DEFAULT 1,
        last_pressed TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        UNIQUE(app_name, key_combination)
    );
    CREATE INDEX IF NOT EXISTS idx_key_statistics_app ON key_statistics(app_name);
";

const UPSERT: &str = "
    INSERT INTO key_statistics (app_name, key_combination, press_count, last_pressed)
    VALUES (?1, ?2, 1, ?3)
    ON CONFLICT(app_name, key_combination) DO UPDATE SET
        press_count = press_count + 1,
        last_pressed = excluded.last_pressed
";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to create database directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// One (application, combination) aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatRow {
    pub app_name: String,
    pub signature: String,
    pub press_count: u64,
    pub last_pressed: DateTime<Utc>,
}

/// Ranked statistics for a single application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppStats {
    pub app_name: String,
    /// Most pressed first, possibly truncated to the requested limit
    pub rows: Vec<StatRow>,
    /// Distinct combinations recorded for the app, ignoring the limit
    pub total_combinations: u64,
    /// Sum of all press counts for the app, ignoring the limit
    pub total_presses: u64,
}

pub struct StatsStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl StatsStore {
    /// Open (or create) the database at `path`, creating parent directories
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.execute_batch(SCHEMA)?;

        tracing::info!("Opened statistics database at {}", path.display());
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Non-persistent store, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Count one press of `signature` in `app_name`
    pub fn upsert(&self, app_name: &str, signature: &str) -> Result<(), StoreError> {
        self.upsert_at(app_name, signature, Utc::now())
    }

    pub fn upsert_at(
        &self,
        app_name: &str,
        signature: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut stmt = self.conn.prepare_cached(UPSERT)?;
        stmt.execute(params![app_name, signature, at])?;
        Ok(())
    }

    /// Rows for one app, most pressed first (ties by combination name)
    pub fn stats_for_app(
        &self,
        app_name: &str,
        limit: Option<usize>,
    ) -> Result<AppStats, StoreError> {
        // SQLite treats a negative LIMIT as "no limit"
        let limit = limit.map(|l| l.min(i64::MAX as usize) as i64).unwrap_or(-1);

        let mut stmt = self.conn.prepare_cached(
            "SELECT app_name, key_combination, press_count, last_pressed
             FROM key_statistics
             WHERE app_name = ?1
             ORDER BY press_count DESC, key_combination ASC
             LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![app_name, limit], row_to_stat)?
            .collect::<Result<Vec<_>, _>>()?;

        let (total_combinations, total_presses): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(press_count), 0)
             FROM key_statistics WHERE app_name = ?1",
            params![app_name],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(AppStats {
            app_name: app_name.to_string(),
            rows,
            total_combinations: to_count(total_combinations),
            total_presses: to_count(total_presses),
        })
    }

    /// Distinct application names, sorted
    pub fn all_apps(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT DISTINCT app_name FROM key_statistics ORDER BY app_name")?;
        let apps = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(apps)
    }

    pub fn total_presses(&self) -> Result<u64, StoreError> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(press_count), 0) FROM key_statistics",
            [],
            |row| row.get(0),
        )?;
        Ok(to_count(total))
    }

    pub fn presses_for_app(&self, app_name: &str) -> Result<u64, StoreError> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(press_count), 0) FROM key_statistics WHERE app_name = ?1",
            params![app_name],
            |row| row.get(0),
        )?;
        Ok(to_count(total))
    }

    pub fn row(&self, app_name: &str, signature: &str) -> Result<Option<StatRow>, StoreError> {
        let row = self
            .conn
            .query_row(
                "SELECT app_name, key_combination, press_count, last_pressed
                 FROM key_statistics
                 WHERE app_name = ?1 AND key_combination = ?2",
                params![app_name, signature],
                row_to_stat,
            )
            .optional()?;
        Ok(row)
    }

    /// Combinations ranked across every application
    pub fn top_signatures(&self, limit: usize) -> Result<Vec<(String, u64)>, StoreError> {
        let limit = limit.min(i64::MAX as usize) as i64;
        let mut stmt = self.conn.prepare_cached(
            "SELECT key_combination, SUM(press_count) AS total
             FROM key_statistics
             GROUP BY key_combination
             ORDER BY total DESC, key_combination ASC
             LIMIT ?1",
        )?;
        let ranked = stmt
            .query_map(params![limit], |row| {
                Ok((row.get::<_, String>(0)?, to_count(row.get(1)?)))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ranked)
    }

    /// Delete every row; returns how many were removed
    pub fn clear_all(&self) -> Result<usize, StoreError> {
        let removed = self.conn.execute("DELETE FROM key_statistics", [])?;
        tracing::info!("Cleared {} statistics rows", removed);
        Ok(removed)
    }
}

fn row_to_stat(row: &rusqlite::Row<'_>) -> rusqlite::Result<StatRow> {
    Ok(StatRow {
        app_name: row.get(0)?,
        signature: row.get(1)?,
        press_count: to_count(row.get(2)?),
        last_pressed: row.get(3)?,
    })
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_upsert_counts_match_occurrences() {
        let store = StatsStore::open_in_memory().unwrap();
        let presses = [
            ("vim", "J"),
            ("vim", "J"),
            ("vim", "K"),
            ("firefox", "Ctrl+T"),
            ("vim", "J"),
        ];
        for (app, sig) in presses {
            store.upsert(app, sig).unwrap();
        }

        assert_eq!(store.row("vim", "J").unwrap().unwrap().press_count, 3);
        assert_eq!(store.row("vim", "K").unwrap().unwrap().press_count, 1);
        assert_eq!(store.row("firefox", "Ctrl+T").unwrap().unwrap().press_count, 1);
        assert!(store.row("firefox", "J").unwrap().is_none());
        assert_eq!(store.total_presses().unwrap(), 5);
        assert_eq!(store.presses_for_app("vim").unwrap(), 4);
    }

    #[test]
    fn test_upsert_refreshes_last_pressed() {
        let store = StatsStore::open_in_memory().unwrap();
        let first = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 3, 2, 17, 30, 0).unwrap();

        store.upsert_at("app", "Ctrl+S", first).unwrap();
        assert_eq!(store.row("app", "Ctrl+S").unwrap().unwrap().last_pressed, first);

        store.upsert_at("app", "Ctrl+S", second).unwrap();
        let row = store.row("app", "Ctrl+S").unwrap().unwrap();
        assert_eq!(row.press_count, 2);
        assert_eq!(row.last_pressed, second);
    }

    #[test]
    fn test_stats_for_app_ordering_and_totals() {
        let store = StatsStore::open_in_memory().unwrap();
        for _ in 0..3 {
            store.upsert("notepad", "Ctrl+S").unwrap();
        }
        store.upsert("notepad", "Ctrl+C").unwrap();
        store.upsert("notepad", "Ctrl+A").unwrap();
        store.upsert("word", "Ctrl+S").unwrap();

        let stats = store.stats_for_app("notepad", None).unwrap();
        let ranked: Vec<_> = stats
            .rows
            .iter()
            .map(|r| (r.signature.as_str(), r.press_count))
            .collect();
        assert_eq!(ranked, vec![("Ctrl+S", 3), ("Ctrl+A", 1), ("Ctrl+C", 1)]);
        assert_eq!(stats.total_combinations, 3);
        assert_eq!(stats.total_presses, 5);

        let limited = store.stats_for_app("notepad", Some(1)).unwrap();
        assert_eq!(limited.rows.len(), 1);
        assert_eq!(limited.total_combinations, 3);
        assert_eq!(limited.total_presses, 5);
    }

    #[test]
    fn test_stats_for_unknown_app_is_empty() {
        let store = StatsStore::open_in_memory().unwrap();
        let stats = store.stats_for_app("ghost", Some(10)).unwrap();
        assert!(stats.rows.is_empty());
        assert_eq!(stats.total_combinations, 0);
        assert_eq!(stats.total_presses, 0);
        assert_eq!(store.presses_for_app("ghost").unwrap(), 0);
    }

    #[test]
    fn test_all_apps_sorted_and_distinct() {
        let store = StatsStore::open_in_memory().unwrap();
        store.upsert("zed", "A").unwrap();
        store.upsert("alacritty", "B").unwrap();
        store.upsert("zed", "C").unwrap();
        store.upsert("zed", "A").unwrap();

        assert_eq!(store.all_apps().unwrap(), vec!["alacritty", "zed"]);
    }

    #[test]
    fn test_clear_then_restart_at_one() {
        let store = StatsStore::open_in_memory().unwrap();
        store.upsert("a", "X").unwrap();
        store.upsert("a", "X").unwrap();
        store.upsert("b", "Y").unwrap();

        assert_eq!(store.clear_all().unwrap(), 2);
        assert!(store.all_apps().unwrap().is_empty());
        assert_eq!(store.total_presses().unwrap(), 0);

        store.upsert("a", "X").unwrap();
        assert_eq!(store.row("a", "X").unwrap().unwrap().press_count, 1);
    }

    #[test]
    fn test_top_signatures_sums_across_apps() {
        let store = StatsStore::open_in_memory().unwrap();
        store.upsert("a", "Ctrl+C").unwrap();
        store.upsert("b", "Ctrl+C").unwrap();
        store.upsert("b", "Ctrl+V").unwrap();
        store.upsert("c", "Enter").unwrap();

        assert_eq!(
            store.top_signatures(2).unwrap(),
            vec![("Ctrl+C".to_string(), 2), ("Ctrl+V".to_string(), 1)]
        );
        assert!(store.top_signatures(0).unwrap().is_empty());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/stats.db");

        {
            let store = StatsStore::open(&path).unwrap();
            assert_eq!(store.path(), Some(path.as_path()));
            store.upsert("notepad", "Ctrl+S").unwrap();
            store.upsert("notepad", "Ctrl+S").unwrap();
        }

        let store = StatsStore::open(&path).unwrap();
        assert_eq!(store.row("notepad", "Ctrl+S").unwrap().unwrap().press_count, 2);

        store.upsert("notepad", "Ctrl+S").unwrap();
        assert_eq!(store.presses_for_app("notepad").unwrap(), 3);
    }

    #[test]
    fn test_open_fails_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let result = StatsStore::open(&blocker.join("stats.db"));
        assert!(matches!(result, Err(StoreError::CreateDir { .. })));
    }
}
