//! Windowed batch fetching of assets through the cache
//!
//! Keys are processed in windows of `concurrency_limit`. Cache hits are
//! answered synchronously; the misses of a window are read from the store
//! concurrently, the whole window is awaited, the results are filled into the
//! cache in input order, and control is yielded before the next window.

use crate::cache::AssetCache;
use crate::error::Result;
use crate::handles::HandleFactory;
use crate::store::BlobStore;
use crate::types::{AssetKey, BinaryObject};
use futures::future::join_all;
use tracing::{debug, warn};

pub struct BatchFetcher<S> {
    store: S,
}

impl<S: BlobStore> BatchFetcher<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolve every key to its object.
    ///
    /// The output has the same length and order as `keys`. `None` inputs
    /// pass through without a lookup; missing or failed assets come back as
    /// `None` without affecting their neighbours.
    pub async fn fetch_many<F: HandleFactory>(
        &self,
        cache: &AssetCache<F>,
        keys: &[Option<AssetKey>],
        concurrency_limit: usize,
    ) -> Vec<Option<BinaryObject>> {
        let window = concurrency_limit.max(1);
        let mut results: Vec<Option<BinaryObject>> = Vec::with_capacity(keys.len());
        let windows = keys.len().div_ceil(window);

        for (index, slice) in keys.chunks(window).enumerate() {
            let base = results.len();
            let mut misses: Vec<(usize, &AssetKey)> = Vec::new();

            for (offset, key) in slice.iter().enumerate() {
                let found = match key {
                    Some(key) => {
                        let hit = cache.lookup(key);
                        if hit.is_none() {
                            misses.push((base + offset, key));
                        }
                        hit
                    }
                    None => None,
                };
                results.push(found);
            }

            if !misses.is_empty() {
                let reads = join_all(misses.iter().map(|(_, key)| self.store.get(key))).await;
                for ((slot, key), read) in misses.into_iter().zip(reads) {
                    results[slot] = Self::settle(cache, key, read);
                }
            }

            if index + 1 < windows {
                tokio::task::yield_now().await;
            }
        }

        debug!(
            requested = keys.len(),
            resolved = results.iter().filter(|r| r.is_some()).count(),
            "Batch fetch complete"
        );
        results
    }

    /// Resolve a single key, surfacing the storage error to the caller
    pub async fn fetch_one<F: HandleFactory>(
        &self,
        cache: &AssetCache<F>,
        key: &AssetKey,
    ) -> Result<Option<BinaryObject>> {
        if let Some(hit) = cache.lookup(key) {
            return Ok(Some(hit));
        }
        let found = self.store.get(key).await?;
        if let Some(object) = &found {
            cache.fill(key.clone(), object.clone());
        }
        Ok(found)
    }

    fn settle<F: HandleFactory>(
        cache: &AssetCache<F>,
        key: &AssetKey,
        read: Result<Option<BinaryObject>>,
    ) -> Option<BinaryObject> {
        match read {
            Ok(Some(object)) => {
                cache.fill(key.clone(), object.clone());
                Some(object)
            }
            Ok(None) => {
                debug!(key = %key, "Asset not in store");
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Asset read failed");
                None
            }
        }
    }
}
