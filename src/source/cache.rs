//! Bounded LRU memoization of decoded raw datasets.
//!
//! Keyed by (department, year). Only successful fetches are stored, so a
//! failed key is retried on the next request. When full, the least
//! recently used entry is evicted.

use super::TransactionSource;
use crate::error::{ExplorerError, Result};
use crate::models::DatasetKey;
use crate::pipeline::RawDataset;
use lru::LruCache;
use std::num::NonZeroUsize;
use tracing::debug;

#[derive(Debug)]
pub struct FetchCache {
    entries: LruCache<DatasetKey, RawDataset>,
    hits: u64,
    misses: u64,
}

impl FetchCache {
    /// Create a cache holding at most `capacity` datasets (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a key, marking it as most recently used
    pub fn get(&mut self, key: &DatasetKey) -> Option<RawDataset> {
        let entry = self.entries.get(key).cloned();
        if entry.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        entry
    }

    /// Store a dataset, returning the key evicted to make room, if any
    pub fn put(&mut self, key: DatasetKey, dataset: RawDataset) -> Option<DatasetKey> {
        match self.entries.push(key.clone(), dataset) {
            Some((evicted, _)) if evicted != key => {
                debug!("Evicted {} from fetch cache", evicted);
                Some(evicted)
            }
            _ => None,
        }
    }

    /// Remove a single key, leaving every other entry in place
    pub fn invalidate(&mut self, key: &DatasetKey) -> Option<RawDataset> {
        self.entries.pop(key)
    }

    pub fn contains(&self, key: &DatasetKey) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// (hits, misses) since creation
    pub fn counters(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    /// Return the cached dataset or fetch, decode and store it
    pub fn get_or_fetch<S: TransactionSource + ?Sized>(
        &mut self,
        key: &DatasetKey,
        source: &S,
    ) -> Result<RawDataset> {
        if let Some(dataset) = self.get(key) {
            debug!("Fetch cache hit for {}", key);
            return Ok(dataset);
        }

        let payload = source.fetch(key)?;
        let dataset = RawDataset::from_payload(key.clone(), payload).map_err(|e| {
            if e.is_no_data() {
                e
            } else {
                ExplorerError::fetch_unavailable(
                    key.department.as_str(),
                    key.year,
                    format!("unreadable payload: {}", e),
                )
            }
        })?;
        self.put(key.clone(), dataset.clone());
        Ok(dataset)
    }
}
