//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the KnowledgeStore
//! trait plus the run bookkeeping used by the coordinator.

use crate::sources::Discovery;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{KnowledgeStore, StorageError, StorageResult};
use crate::storage::{LinkRecord, RunRecord, RunStatus, StoreStats};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const LINK_COLUMNS: &str = "url, title, category, source, first_seen";
const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, query, status, inserted";

/// SQLite storage backend
///
/// A single connection behind a mutex: writers are serialized, and a batch
/// is committed before `insert_batch` returns.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    fts_available: bool,
}

/// Current time as stored in `first_seen`, `started_at` and `finished_at`
///
/// Fixed-width UTC with milliseconds, so string order equals time order.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        Self::with_connection(conn)
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        let fts_available = initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            fts_available,
        })
    }

    /// Returns true if the full-text index could be created
    pub fn full_text_available(&self) -> bool {
        self.fts_available
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    // ===== Run Management =====

    /// Records the start of a run
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    pub fn create_run(&self, config_hash: &str, query: &str) -> StorageResult<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, query, status) VALUES (?1, ?2, ?3, ?4)",
            params![
                timestamp_now(),
                config_hash,
                query,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Marks a run as finished with its final status and inserted count
    pub fn finish_run(&self, run_id: i64, status: RunStatus, inserted: usize) -> StorageResult<()> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, inserted = ?3 WHERE id = ?4",
            params![status.to_db_string(), timestamp_now(), inserted as i64, run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    /// Gets a run by ID
    pub fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
            params![run_id],
            run_from_row,
        )
        .optional()?
        .ok_or(StorageError::RunNotFound(run_id))
    }

    /// Gets the most recent run
    pub fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let conn = self.lock()?;
        let run = conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;
        Ok(run)
    }

    // ===== Queries =====

    /// Records first seen at or after `since`, oldest first
    pub fn records_since(&self, since: &str) -> StorageResult<Vec<LinkRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM links WHERE first_seen >= ?1 ORDER BY first_seen, url",
            LINK_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![since], link_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Record count per category, largest first
    pub fn category_counts(&self) -> StorageResult<Vec<(String, usize)>> {
        self.group_counts("category")
    }

    /// Record count per source, largest first
    pub fn source_counts(&self) -> StorageResult<Vec<(String, usize)>> {
        self.group_counts("source")
    }

    fn group_counts(&self, column: &str) -> StorageResult<Vec<(String, usize)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {0}, COUNT(*) AS n FROM links GROUP BY {0} ORDER BY n DESC, {0}",
            column
        ))?;
        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    /// Collects the numbers printed by `--stats`
    pub fn stats(&self) -> StorageResult<StoreStats> {
        let runs: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;

        Ok(StoreStats {
            total_links: self.count()?,
            by_category: self.category_counts()?,
            by_source: self.source_counts()?,
            runs: runs as usize,
            latest_run: self.latest_run()?,
            full_text: self.fts_available,
        })
    }

    fn search_fts(&self, conn: &Connection, query: &str) -> rusqlite::Result<Vec<LinkRecord>> {
        let mut stmt = conn.prepare(
            "SELECT l.url, l.title, l.category, l.source, l.first_seen
             FROM links_fts JOIN links l ON l.rowid = links_fts.rowid
             WHERE links_fts MATCH ?1
             ORDER BY bm25(links_fts)",
        )?;
        let records = stmt
            .query_map(params![query], link_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn all_records(&self, conn: &Connection) -> rusqlite::Result<Vec<LinkRecord>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM links ORDER BY first_seen, url",
            LINK_COLUMNS
        ))?;
        let records = stmt
            .query_map([], link_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

/// Builds an FTS5 query: every whitespace-separated term as a quoted prefix
///
/// Returns `None` when the query has no terms.
fn fts_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|term| format!("\"{}\"*", term.replace('"', "\"\"")))
        .collect();

    (!terms.is_empty()).then(|| terms.join(" "))
}

fn matches_substring(record: &LinkRecord, needle: &str) -> bool {
    record.url.to_lowercase().contains(needle)
        || record.title.to_lowercase().contains(needle)
        || record.category.to_lowercase().contains(needle)
}

fn link_from_row(row: &Row<'_>) -> rusqlite::Result<LinkRecord> {
    Ok(LinkRecord {
        url: row.get(0)?,
        title: row.get(1)?,
        category: row.get(2)?,
        source: row.get(3)?,
        first_seen: row.get(4)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        query: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(RunStatus::Running),
        inserted: row.get::<_, i64>(6)? as usize,
    })
}

impl KnowledgeStore for SqliteStore {
    fn insert_batch(&self, records: &[Discovery]) -> StorageResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let first_seen = timestamp_now();
        let mut inserted = 0;

        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO links (url, title, category, source, first_seen)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in records {
                inserted += stmt.execute(params![
                    record.url,
                    record.title,
                    record.category,
                    record.source,
                    first_seen
                ])?;
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    fn search_local(&self, query: &str) -> StorageResult<Vec<LinkRecord>> {
        let conn = self.lock()?;

        let Some(fts) = fts_query(query) else {
            return Ok(self.all_records(&conn)?);
        };

        if self.fts_available {
            match self.search_fts(&conn, &fts) {
                Ok(found) if !found.is_empty() => return Ok(found),
                Ok(_) => tracing::debug!("No full-text hits for '{}', scanning", query),
                Err(e) => tracing::debug!("Full-text query failed for '{}': {}", query, e),
            }
        }

        let needle = query.trim().to_lowercase();
        Ok(self
            .all_records(&conn)?
            .into_iter()
            .filter(|record| matches_substring(record, &needle))
            .collect())
    }

    fn count(&self) -> StorageResult<usize> {
        let count: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn get(&self, url: &str) -> StorageResult<Option<LinkRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &format!("SELECT {} FROM links WHERE url = ?1", LINK_COLUMNS),
                params![url],
                link_from_row,
            )
            .optional()?;
        Ok(record)
    }
}
