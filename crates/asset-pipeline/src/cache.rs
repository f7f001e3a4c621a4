//! Asset cache: the LRU blob cache and the handle registry kept in lockstep
//!
//! One instance is shared by reference between the fetcher, the renderer and
//! backup code on a single logical thread. Every method is synchronous and
//! releases its interior borrow before returning, so interleaved tasks never
//! observe a half-applied fill or eviction.

use crate::handles::{HandleFactory, HandleRegistry, ObjectUrlFactory};
use crate::lru::LruBlobCache;
use crate::types::{AssetKey, BinaryObject, CacheStats, DisplayHandle};
use std::cell::RefCell;
use std::collections::HashSet;
use tracing::debug;

struct Inner<F> {
    lru: LruBlobCache,
    handles: HandleRegistry<F>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

pub struct AssetCache<F = ObjectUrlFactory> {
    inner: RefCell<Inner<F>>,
}

impl AssetCache<ObjectUrlFactory> {
    pub fn new(capacity: usize) -> Self {
        Self::with_factory(capacity, ObjectUrlFactory::default())
    }
}

impl<F: HandleFactory> AssetCache<F> {
    pub fn with_factory(capacity: usize, factory: F) -> Self {
        Self {
            inner: RefCell::new(Inner {
                lru: LruBlobCache::new(capacity),
                handles: HandleRegistry::new(factory),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    /// Cache-only lookup, counted as a hit or miss
    pub fn lookup(&self, key: &AssetKey) -> Option<BinaryObject> {
        let mut inner = self.inner.borrow_mut();
        match inner.lru.get(key) {
            Some(object) => {
                inner.hits += 1;
                debug!(key = %key, "Asset cache hit");
                Some(object)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Insert or refresh an entry. Evicted entries have their display
    /// handles revoked before they are dropped.
    pub fn fill(&self, key: AssetKey, object: BinaryObject) {
        let mut inner = self.inner.borrow_mut();
        let Inner { lru, handles, .. } = &mut *inner;
        let evicted = lru.fill(key, object, handles);
        inner.evictions += evicted as u64;
    }

    pub fn touch(&self, key: &AssetKey) -> bool {
        self.inner.borrow_mut().lru.touch(key)
    }

    pub fn contains(&self, key: &AssetKey) -> bool {
        self.inner.borrow().lru.contains(key)
    }

    /// Display handle for a resolved asset.
    ///
    /// The asset is (re)admitted to the cache first, so every live handle
    /// belongs to a cached entry and is revoked when that entry is evicted.
    pub fn handle_for(&self, key: &AssetKey, object: &BinaryObject) -> Option<DisplayHandle> {
        if !self.touch(key) {
            self.fill(key.clone(), object.clone());
        }
        let mut inner = self.inner.borrow_mut();
        if !inner.lru.contains(key) {
            // Zero capacity: nothing can own a handle
            return None;
        }
        inner.handles.resolve(key, object)
    }

    /// Start a render pass. Keys resolved through the returned
    /// [`RenderPass`] stay cached, and their handles live, until it is
    /// dropped.
    pub fn begin_pass(&self) -> RenderPass<'_, F> {
        RenderPass {
            cache: self,
            pinned: HashSet::new(),
        }
    }

    pub fn handle(&self, key: &AssetKey) -> Option<DisplayHandle> {
        self.inner.borrow().handles.get(key).cloned()
    }

    /// Revoke the handle for `key` without evicting the entry
    pub fn revoke(&self, key: &AssetKey) -> bool {
        self.inner.borrow_mut().handles.revoke(key)
    }

    /// Drop every entry and revoke every handle
    pub fn clear(&self) {
        let mut inner = self.inner.borrow_mut();
        let Inner { lru, handles, .. } = &mut *inner;
        lru.clear(handles);
        handles.clear();
        debug!("Asset cache cleared");
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().lru.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.borrow().lru.capacity()
    }

    /// Keys from least- to most-recently-used
    pub fn keys(&self) -> Vec<AssetKey> {
        self.inner.borrow().lru.keys().cloned().collect()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.borrow();
        CacheStats {
            entries: inner.lru.len(),
            capacity: inner.lru.capacity(),
            live_handles: inner.handles.len(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }

    /// Run `f` against the handle factory (inspection in tests and stats)
    pub fn with_factory_ref<R>(&self, f: impl FnOnce(&F) -> R) -> R {
        f(self.inner.borrow().handles.factory())
    }
}

/// Keys pinned by one render pass
///
/// A pass can only evict entries it has not resolved itself, so a handle
/// built into one of its nodes is never revoked while the pass runs. Once
/// every cached entry is pinned, further assets resolve without a handle.
pub struct RenderPass<'c, F: HandleFactory> {
    cache: &'c AssetCache<F>,
    pinned: HashSet<AssetKey>,
}

impl<F: HandleFactory> RenderPass<'_, F> {
    pub fn resolve(&mut self, key: &AssetKey, object: &BinaryObject) -> Option<DisplayHandle> {
        let handle = self.cache.handle_for(key, object)?;
        if !self.pinned.contains(key) && self.cache.inner.borrow_mut().lru.pin(key) {
            self.pinned.insert(key.clone());
        }
        Some(handle)
    }

    pub fn len(&self) -> usize {
        self.pinned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }
}

impl<F: HandleFactory> Drop for RenderPass<'_, F> {
    fn drop(&mut self) {
        let mut inner = self.cache.inner.borrow_mut();
        for key in self.pinned.drain() {
            inner.lru.unpin(&key);
        }
    }
}
