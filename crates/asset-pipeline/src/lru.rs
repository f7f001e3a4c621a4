//! Bounded in-memory LRU map from asset key to binary object
//!
//! Recency is a total order: every insert or access stamps the entry with the
//! next value of a monotonic counter, and eviction pops the smallest stamp.
//! Ties cannot occur, so eviction order is exactly least-recently-used with
//! insertion order as the natural tie-break.
//!
//! Entries may be pinned. A pinned entry is skipped by eviction, and when
//! every entry is pinned a new key is not admitted at all, so the cache never
//! grows past its capacity.

use crate::types::{AssetKey, BinaryObject};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Notified for every entry leaving the cache, before the entry is dropped
pub trait EvictionListener {
    fn on_evict(&mut self, key: &AssetKey, object: &BinaryObject);
}

impl EvictionListener for () {
    fn on_evict(&mut self, _key: &AssetKey, _object: &BinaryObject) {}
}

struct Slot {
    object: BinaryObject,
    stamp: u64,
}

pub struct LruBlobCache {
    capacity: usize,
    entries: HashMap<AssetKey, Slot>,
    recency: BTreeMap<u64, AssetKey>,
    pins: HashMap<AssetKey, usize>,
    clock: u64,
}

impl LruBlobCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            pins: HashMap::new(),
            clock: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &AssetKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Cache-only lookup. A hit counts as an access.
    pub fn get(&mut self, key: &AssetKey) -> Option<BinaryObject> {
        if !self.touch(key) {
            return None;
        }
        self.entries.get(key).map(|slot| slot.object.clone())
    }

    /// Lookup without changing recency
    pub fn peek(&self, key: &AssetKey) -> Option<&BinaryObject> {
        self.entries.get(key).map(|slot| &slot.object)
    }

    /// Insert or refresh an entry as most-recently-used, then enforce
    /// capacity. Returns the number of entries evicted.
    ///
    /// A new key is dropped without being inserted when the cache is full of
    /// pinned entries.
    pub fn fill(
        &mut self,
        key: AssetKey,
        object: BinaryObject,
        listener: &mut impl EvictionListener,
    ) -> usize {
        if !self.entries.contains_key(&key) && !self.has_room() {
            debug!(key = %key, "Cache full of pinned assets, not admitting");
            return 0;
        }
        let stamp = self.next_stamp();
        if let Some(previous) = self.entries.insert(key.clone(), Slot { object, stamp }) {
            self.recency.remove(&previous.stamp);
        }
        self.recency.insert(stamp, key);
        self.evict_overflow(listener)
    }

    /// Mark an entry most-recently-used. Returns false if absent.
    pub fn touch(&mut self, key: &AssetKey) -> bool {
        let stamp = self.next_stamp();
        match self.entries.get_mut(key) {
            Some(slot) => {
                self.recency.remove(&slot.stamp);
                slot.stamp = stamp;
                self.recency.insert(stamp, key.clone());
                true
            }
            None => false,
        }
    }

    /// Protect a cached entry from eviction until a matching
    /// [`unpin`](Self::unpin). Pins nest. Returns false if absent.
    pub fn pin(&mut self, key: &AssetKey) -> bool {
        if !self.entries.contains_key(key) {
            return false;
        }
        *self.pins.entry(key.clone()).or_insert(0) += 1;
        true
    }

    pub fn unpin(&mut self, key: &AssetKey) {
        if let Some(count) = self.pins.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                self.pins.remove(key);
            }
        }
    }

    pub fn is_pinned(&self, key: &AssetKey) -> bool {
        self.pins.contains_key(key)
    }

    fn has_room(&self) -> bool {
        self.entries.len() < self.capacity
            || self.entries.keys().any(|key| !self.pins.contains_key(key))
    }

    /// Evict least-recently-used unpinned entries while over capacity
    pub fn evict_overflow(&mut self, listener: &mut impl EvictionListener) -> usize {
        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            let victim = self
                .recency
                .iter()
                .find(|(_, key)| !self.pins.contains_key(*key))
                .map(|(stamp, _)| *stamp);
            let Some(key) = victim.and_then(|stamp| self.recency.remove(&stamp)) else {
                break;
            };
            if let Some(slot) = self.entries.get(&key) {
                listener.on_evict(&key, &slot.object);
            }
            self.entries.remove(&key);
            debug!(key = %key, "Evicted least-recently-used asset");
            evicted += 1;
        }
        evicted
    }

    /// Drop every entry, notifying the listener in LRU order
    pub fn clear(&mut self, listener: &mut impl EvictionListener) {
        while let Some((_, key)) = self.recency.pop_first() {
            if let Some(slot) = self.entries.remove(&key) {
                listener.on_evict(&key, &slot.object);
            }
        }
        self.entries.clear();
        self.pins.clear();
    }

    /// Keys from least- to most-recently-used
    pub fn keys(&self) -> impl Iterator<Item = &AssetKey> {
        self.recency.values()
    }

    fn next_stamp(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}
