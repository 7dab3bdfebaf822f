//! Storage traits and error types
//!
//! This module defines the trait interface for catalog backends and
//! associated error types.

use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// One catalog entry as a backend stores it
///
/// Structured fields (`sections`, `keywords`) travel as JSON text so that
/// backends only deal in strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRow {
    pub file_hash: String,
    pub url: String,
    pub first_seen: String,
    pub title: String,
    pub local_path: String,
    pub sections: String,
    pub keywords: String,
}

/// Trait for catalog backend implementations
///
/// The dedup ledger and the article catalog share one key, the content hash.
/// Implementations must be safe to call from many workers at once.
pub trait CatalogBackend: Send + Sync {
    /// Looks up an entry by content hash
    fn get(&self, file_hash: &str) -> StoreResult<Option<CatalogRow>>;

    /// Inserts the entry unless its hash is already present
    ///
    /// The existence check and the insert must be one atomic step: two callers
    /// racing on the same hash see exactly one `true`.
    fn put_if_absent(&self, row: &CatalogRow) -> StoreResult<bool>;

    /// Returns up to `limit` entries with hashes strictly after `after`,
    /// ordered by hash
    fn scan(&self, after: Option<&str>, limit: u32) -> StoreResult<Vec<CatalogRow>>;

    /// Removes every entry
    fn delete_all(&self) -> StoreResult<()>;

    /// Counts stored entries
    fn count(&self) -> StoreResult<u64>;
}
