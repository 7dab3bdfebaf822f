//! In-memory catalog backend, used by tests and throwaway runs

use crate::store::traits::{CatalogBackend, CatalogRow, StoreError, StoreResult};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard};

/// Catalog held in a sorted map keyed by content hash
#[derive(Default)]
pub struct MemoryBackend {
    rows: Mutex<BTreeMap<String, CatalogRow>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, BTreeMap<String, CatalogRow>>> {
        self.rows
            .lock()
            .map_err(|_| StoreError::Unavailable("memory catalog lock poisoned".to_string()))
    }
}

impl CatalogBackend for MemoryBackend {
    fn get(&self, file_hash: &str) -> StoreResult<Option<CatalogRow>> {
        Ok(self.lock()?.get(file_hash).cloned())
    }

    fn put_if_absent(&self, row: &CatalogRow) -> StoreResult<bool> {
        let mut rows = self.lock()?;
        if rows.contains_key(&row.file_hash) {
            return Ok(false);
        }
        rows.insert(row.file_hash.clone(), row.clone());
        Ok(true)
    }

    fn scan(&self, after: Option<&str>, limit: u32) -> StoreResult<Vec<CatalogRow>> {
        let rows = self.lock()?;
        let lower = match after {
            Some(hash) => Bound::Excluded(hash),
            None => Bound::Unbounded,
        };

        Ok(rows
            .range::<str, _>((lower, Bound::Unbounded))
            .take(limit as usize)
            .map(|(_, row)| row.clone())
            .collect())
    }

    fn delete_all(&self) -> StoreResult<()> {
        self.lock()?.clear();
        Ok(())
    }

    fn count(&self) -> StoreResult<u64> {
        Ok(self.lock()?.len() as u64)
    }
}
