//! Storage module for the knowledge store
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Idempotent, batched insertion of discovered links
//! - Full-text lookup with a substring fallback
//! - Run tracking (start/finish, config hash, inserted count)

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{timestamp_now, SqliteStore};
pub use traits::{KnowledgeStore, StorageError, StorageResult};

use std::path::Path;

/// Opens (creating if needed) the knowledge store at `path`
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStore)` - Successfully initialized storage
/// * `Err(StorageError)` - The file could not be opened or the schema created
pub fn open_store(path: &Path) -> StorageResult<SqliteStore> {
    SqliteStore::open(path)
}

/// A persisted link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub url: String,
    pub title: String,
    pub category: String,
    pub source: String,
    pub first_seen: String,
}

/// Represents a harvest run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub query: String,
    pub status: RunStatus,
    pub inserted: usize,
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Aggregate numbers about the store
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub total_links: usize,
    pub by_category: Vec<(String, usize)>,
    pub by_source: Vec<(String, usize)>,
    pub runs: usize,
    pub latest_run: Option<RunRecord>,
    pub full_text: bool,
}
