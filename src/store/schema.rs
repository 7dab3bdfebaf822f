//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the catalog database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Dedup ledger: one row per unique document content
CREATE TABLE IF NOT EXISTS scraped (
    file_hash TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    first_seen TEXT NOT NULL
);

-- Article catalog, keyed by the same content hash
CREATE TABLE IF NOT EXISTS articles (
    file_hash TEXT PRIMARY KEY REFERENCES scraped(file_hash) ON DELETE CASCADE,
    title TEXT NOT NULL DEFAULT '',
    local_path TEXT NOT NULL DEFAULT '',
    sections TEXT NOT NULL DEFAULT '{}',
    keywords TEXT NOT NULL DEFAULT '[]'
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
