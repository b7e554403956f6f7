//! Storage traits and error types
//!
//! This module defines the trait interface the scheduler writes through and
//! the associated error types.

use crate::sources::Discovery;
use crate::storage::LinkRecord;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage lock poisoned")]
    Poisoned,

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// URL-keyed, append-only store of discovered links
///
/// Implementations serialize writers internally, so a shared reference is
/// enough to insert.
pub trait KnowledgeStore: Send + Sync {
    /// Inserts a batch in one transaction
    ///
    /// Records whose URL already exists (in the store or earlier in the same
    /// batch) are silently skipped.
    ///
    /// # Returns
    ///
    /// The number of newly inserted records
    fn insert_batch(&self, records: &[Discovery]) -> StorageResult<usize>;

    /// Looks up records matching a free-text query
    fn search_local(&self, query: &str) -> StorageResult<Vec<LinkRecord>>;

    /// Total number of records
    fn count(&self) -> StorageResult<usize>;

    /// Gets a record by URL
    fn get(&self, url: &str) -> StorageResult<Option<LinkRecord>>;
}
