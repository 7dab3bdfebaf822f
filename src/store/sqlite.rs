//! SQLite catalog backend
//!
//! This module provides a SQLite-based implementation of the CatalogBackend trait.

use crate::store::schema::initialize_schema;
use crate::store::traits::{CatalogBackend, CatalogRow, StoreError, StoreResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SELECT_ROW: &str = "SELECT s.file_hash, s.url, s.first_seen, a.title, a.local_path, a.sections, a.keywords
     FROM scraped s JOIN articles a ON a.file_hash = s.file_hash";

/// SQLite catalog backend
///
/// One connection guarded by a mutex; every trait call holds the lock for a
/// single statement or transaction.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Opens or creates the catalog database at `path`
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("catalog connection lock poisoned".to_string()))
    }
}

fn row_to_catalog(row: &Row<'_>) -> rusqlite::Result<CatalogRow> {
    Ok(CatalogRow {
        file_hash: row.get(0)?,
        url: row.get(1)?,
        first_seen: row.get(2)?,
        title: row.get(3)?,
        local_path: row.get(4)?,
        sections: row.get(5)?,
        keywords: row.get(6)?,
    })
}

impl CatalogBackend for SqliteBackend {
    fn get(&self, file_hash: &str) -> StoreResult<Option<CatalogRow>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("{SELECT_ROW} WHERE s.file_hash = ?1"),
                params![file_hash],
                row_to_catalog,
            )
            .optional()?;
        Ok(row)
    }

    fn put_if_absent(&self, row: &CatalogRow) -> StoreResult<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO scraped (file_hash, url, first_seen) VALUES (?1, ?2, ?3)",
            params![row.file_hash, row.url, row.first_seen],
        )?;

        if inserted == 0 {
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO articles (file_hash, title, local_path, sections, keywords)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                row.file_hash,
                row.title,
                row.local_path,
                row.sections,
                row.keywords
            ],
        )?;
        tx.commit()?;

        Ok(true)
    }

    fn scan(&self, after: Option<&str>, limit: u32) -> StoreResult<Vec<CatalogRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_ROW} WHERE s.file_hash > ?1 ORDER BY s.file_hash ASC LIMIT ?2"
        ))?;

        let rows = stmt
            .query_map(params![after.unwrap_or(""), limit], row_to_catalog)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn delete_all(&self) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM articles", [])?;
        tx.execute("DELETE FROM scraped", [])?;
        tx.commit()?;
        Ok(())
    }

    fn count(&self) -> StoreResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM scraped", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
