//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the knowledge store.

use rusqlite::Connection;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track harvest runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    query TEXT NOT NULL,
    status TEXT NOT NULL,
    inserted INTEGER NOT NULL DEFAULT 0
);

-- Every link ever discovered; a URL is inserted at most once
CREATE TABLE IF NOT EXISTS links (
    url TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    category TEXT NOT NULL,
    source TEXT NOT NULL,
    first_seen TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_links_category ON links(category);
CREATE INDEX IF NOT EXISTS idx_links_first_seen ON links(first_seen);
"#;

/// Full-text index over `links`, kept in sync by trigger
pub const FTS_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS links_fts USING fts5(
    url, title, category,
    content='links',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS links_fts_insert AFTER INSERT ON links BEGIN
    INSERT INTO links_fts(rowid, url, title, category)
    VALUES (new.rowid, new.url, new.title, new.category);
END;
"#;

/// Initializes the database schema
///
/// Creates all tables and indexes if they don't exist, then tries to create
/// the full-text index. An index created on an existing database is rebuilt
/// from the current rows.
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(true)` - Schema ready, full-text index available
/// * `Ok(false)` - Schema ready, full-text index unavailable
/// * `Err(rusqlite::Error)` - Failed to create the base schema
pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<bool> {
    conn.execute_batch(SCHEMA_SQL)?;

    let existed = table_exists(conn, "links_fts")?;
    if let Err(e) = conn.execute_batch(FTS_SQL) {
        tracing::warn!("Full-text index unavailable, using substring search: {}", e);
        return Ok(false);
    }

    if !existed {
        if let Err(e) = conn.execute("INSERT INTO links_fts(links_fts) VALUES ('rebuild')", []) {
            tracing::warn!("Failed to rebuild full-text index: {}", e);
            return Ok(false);
        }
    }

    Ok(true)
}

fn table_exists(conn: &Connection, name: &str) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
