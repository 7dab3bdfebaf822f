//! Catalog import and export
//!
//! The exchange format is a JSON array of `{title, file_hash, url}` records.
//! Export streams one record at a time; import validates each record on its
//! own so one bad entry never sinks a batch.

mod export;
mod import;

pub use export::export_json;
pub use import::import_json;
pub use crate::store::{ImportReport, RecordError};

use crate::store::{Article, StoreError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that abort a whole import or export
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// One record of the exchange format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRecord {
    pub title: String,
    pub file_hash: String,
    pub url: String,
}

impl From<&Article> for ExchangeRecord {
    fn from(article: &Article) -> Self {
        Self {
            title: article.title.clone(),
            file_hash: article.file_hash.clone(),
            url: article.uri.clone(),
        }
    }
}

impl From<ExchangeRecord> for Article {
    fn from(record: ExchangeRecord) -> Self {
        Article {
            title: record.title,
            uri: record.url,
            file_hash: record.file_hash,
            ..Article::default()
        }
    }
}
