//! Content store: deduplication ledger, article catalog and blob directory
//!
//! Every downloaded document is keyed by the SHA-256 of its bytes. The catalog
//! refuses a second entry for the same hash, so a document reached through
//! several URLs, or by several workers at once, is recorded exactly once.

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryBackend;
pub use schema::{initialize_schema, SCHEMA_SQL};
pub use sqlite::SqliteBackend;
pub use traits::{CatalogBackend, CatalogRow, StoreError, StoreResult};

use crate::config::StorageConfig;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A catalogued document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub uri: String,
    pub file_hash: String,
    pub local_path: String,
    #[serde(default)]
    pub sections: BTreeMap<String, String>,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
}

/// The dedup ledger entry behind an article
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DedupRecord {
    pub file_hash: String,
    pub url: String,
    /// RFC 3339 UTC timestamp
    pub first_seen: String,
}

/// Outcome of recording an article; both variants are successes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Inserted,
    Duplicate,
}

/// Result of importing a batch of articles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub inserted: usize,
    pub duplicates: usize,
    pub errors: Vec<RecordError>,
}

/// A single record an import could not store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordError {
    /// Position of the record in the submitted batch
    pub index: usize,
    /// Short human-readable description of the record
    pub record: String,
    pub reason: String,
}

/// Hex SHA-256 of a document body
pub fn content_hash(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Handle to the catalog and blob directory; cheap to clone
#[derive(Clone)]
pub struct ContentStore {
    backend: Arc<dyn CatalogBackend>,
    blob_dir: PathBuf,
    page_size: u32,
}

impl ContentStore {
    pub fn new(backend: Arc<dyn CatalogBackend>, blob_dir: impl Into<PathBuf>, page_size: u32) -> Self {
        Self {
            backend,
            blob_dir: blob_dir.into(),
            page_size: page_size.max(1),
        }
    }

    /// Opens the SQLite catalog and blob directory named in the configuration
    pub fn open(config: &StorageConfig) -> StoreResult<Self> {
        std::fs::create_dir_all(&config.blob_dir)?;
        let backend = SqliteBackend::open(Path::new(&config.database_path))?;
        Ok(Self::new(
            Arc::new(backend),
            &config.blob_dir,
            config.export_page_size,
        ))
    }

    /// A store backed by memory; blobs still go to `blob_dir`
    pub fn in_memory(blob_dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(MemoryBackend::new()), blob_dir, 500)
    }

    pub fn blob_dir(&self) -> &Path {
        &self.blob_dir
    }

    /// Returns true if content with this hash is already catalogued
    pub fn is_scraped(&self, file_hash: &str) -> StoreResult<bool> {
        Ok(self.backend.get(file_hash)?.is_some())
    }

    /// Looks up the dedup ledger entry for a hash
    pub fn dedup_record(&self, file_hash: &str) -> StoreResult<Option<DedupRecord>> {
        Ok(self.backend.get(file_hash)?.map(|row| DedupRecord {
            file_hash: row.file_hash,
            url: row.url,
            first_seen: row.first_seen,
        }))
    }

    /// Records an article unless its content hash is already present
    ///
    /// The check and the insert happen in one backend call, so concurrent
    /// callers with the same hash get exactly one `Inserted`.
    pub fn record_article(&self, article: &Article, url: &str) -> StoreResult<RecordOutcome> {
        if article.file_hash.trim().is_empty() {
            return Err(StoreError::InvalidRecord(
                "file_hash cannot be empty".to_string(),
            ));
        }

        let row = CatalogRow {
            file_hash: article.file_hash.clone(),
            url: url.to_string(),
            first_seen: Utc::now().to_rfc3339(),
            title: article.title.clone(),
            local_path: article.local_path.clone(),
            sections: serde_json::to_string(&article.sections)?,
            keywords: serde_json::to_string(&article.keywords)?,
        };

        if self.backend.put_if_absent(&row)? {
            Ok(RecordOutcome::Inserted)
        } else {
            Ok(RecordOutcome::Duplicate)
        }
    }

    /// Iterates over every catalogued article in hash order
    ///
    /// Rows are fetched one page at a time; rows that cannot be decoded are
    /// logged and skipped.
    pub fn export_all(&self) -> ArticleIter {
        ArticleIter {
            backend: Arc::clone(&self.backend),
            page_size: self.page_size,
            cursor: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Inserts each `(index, article)` independently; failures are reported
    /// per record and never abort the batch
    pub fn import_batch<I>(&self, records: I) -> ImportReport
    where
        I: IntoIterator<Item = (usize, Article)>,
    {
        let mut report = ImportReport::default();

        for (index, article) in records {
            match self.record_article(&article, &article.uri) {
                Ok(RecordOutcome::Inserted) => report.inserted += 1,
                Ok(RecordOutcome::Duplicate) => report.duplicates += 1,
                Err(e) => {
                    tracing::warn!("Import record {} rejected: {}", index, e);
                    report.errors.push(RecordError {
                        index,
                        record: describe(&article),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Clears the catalog and dedup ledger; blob files are left in place
    pub fn reset(&self) -> StoreResult<()> {
        self.backend.delete_all()?;
        tracing::info!("Catalog reset");
        Ok(())
    }

    /// Number of catalogued articles
    pub fn count(&self) -> StoreResult<u64> {
        self.backend.count()
    }

    /// Writes a document body to `<blob_dir>/<hash>.<ext>`
    ///
    /// The body lands in a temporary file first and is renamed into place, so
    /// readers never see a partial file and concurrent writers of the same
    /// content leave one intact copy.
    pub async fn save_blob(
        &self,
        file_hash: &str,
        extension: &str,
        body: &[u8],
    ) -> StoreResult<PathBuf> {
        tokio::fs::create_dir_all(&self.blob_dir).await?;

        let extension = extension.trim_start_matches('.');
        let file_name = if extension.is_empty() {
            file_hash.to_string()
        } else {
            format!("{file_hash}.{extension}")
        };
        let target = self.blob_dir.join(file_name);

        if tokio::fs::try_exists(&target).await? {
            return Ok(target);
        }

        let temp = self
            .blob_dir
            .join(format!(".{}.part", uuid::Uuid::new_v4()));
        tokio::fs::write(&temp, body).await?;

        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }

        Ok(target)
    }
}

fn describe(article: &Article) -> String {
    if article.title.is_empty() {
        format!("{} ({})", article.file_hash, article.uri)
    } else {
        format!("{} ({})", article.title, article.file_hash)
    }
}

fn decode_row(row: CatalogRow) -> StoreResult<Article> {
    Ok(Article {
        sections: serde_json::from_str(&row.sections)?,
        keywords: serde_json::from_str(&row.keywords)?,
        title: row.title,
        uri: row.url,
        file_hash: row.file_hash,
        local_path: row.local_path,
    })
}

/// Lazy, page-at-a-time iterator over the catalog
pub struct ArticleIter {
    backend: Arc<dyn CatalogBackend>,
    page_size: u32,
    cursor: Option<String>,
    buffer: VecDeque<CatalogRow>,
    exhausted: bool,
}

impl ArticleIter {
    fn fill(&mut self) -> StoreResult<()> {
        let page = self.backend.scan(self.cursor.as_deref(), self.page_size)?;

        if (page.len() as u32) < self.page_size {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            self.cursor = Some(last.file_hash.clone());
        }

        self.buffer.extend(page);
        Ok(())
    }
}

impl Iterator for ArticleIter {
    type Item = StoreResult<Article>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.buffer.is_empty() {
                if self.exhausted {
                    return None;
                }
                if let Err(e) = self.fill() {
                    self.exhausted = true;
                    return Some(Err(e));
                }
                if self.buffer.is_empty() {
                    return None;
                }
            }

            let row = self.buffer.pop_front()?;
            let hash = row.file_hash.clone();
            match decode_row(row) {
                Ok(article) => return Some(Ok(article)),
                Err(e) => {
                    tracing::warn!("Skipping undecodable catalog row {}: {}", hash, e);
                }
            }
        }
    }
}
