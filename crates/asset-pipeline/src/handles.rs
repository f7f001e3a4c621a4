//! Display-handle registry
//!
//! Maps an asset key to at most one live display handle. The registry is the
//! only authority on whether a handle is still valid; revocation always
//! removes the entry, even when the platform reports a failure, so a handle
//! is never revoked twice.

use crate::error::HandleError;
use crate::lru::EvictionListener;
use crate::types::{AssetKey, BinaryObject, DisplayHandle};
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

/// The platform side of display handles (e.g. object URLs)
pub trait HandleFactory {
    fn create(&mut self, key: &AssetKey, object: &BinaryObject)
        -> Result<DisplayHandle, HandleError>;

    fn release(&mut self, handle: &DisplayHandle) -> Result<(), HandleError>;
}

/// Issues `blob:<origin>/<uuid>` URIs, optionally capped at a number of live
/// handles to model resource exhaustion.
#[derive(Debug)]
pub struct ObjectUrlFactory {
    origin: String,
    live: usize,
    limit: Option<usize>,
}

impl ObjectUrlFactory {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            live: 0,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn live(&self) -> usize {
        self.live
    }
}

impl Default for ObjectUrlFactory {
    fn default() -> Self {
        Self::new("inventory")
    }
}

impl HandleFactory for ObjectUrlFactory {
    fn create(
        &mut self,
        _key: &AssetKey,
        _object: &BinaryObject,
    ) -> Result<DisplayHandle, HandleError> {
        if let Some(limit) = self.limit {
            if self.live >= limit {
                return Err(HandleError::Exhausted(format!(
                    "limit of {} live handles reached",
                    limit
                )));
            }
        }
        self.live += 1;
        Ok(DisplayHandle::new(format!(
            "blob:{}/{}",
            self.origin,
            Uuid::new_v4()
        )))
    }

    fn release(&mut self, handle: &DisplayHandle) -> Result<(), HandleError> {
        if self.live == 0 {
            return Err(HandleError::Revoke(format!(
                "{} was not issued by this factory",
                handle
            )));
        }
        self.live -= 1;
        Ok(())
    }
}

pub struct HandleRegistry<F = ObjectUrlFactory> {
    factory: F,
    handles: HashMap<AssetKey, DisplayHandle>,
}

impl<F: HandleFactory> HandleRegistry<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            handles: HashMap::new(),
        }
    }

    /// Existing handle for `key`, or a new one bound to `object`
    pub fn try_resolve(
        &mut self,
        key: &AssetKey,
        object: &BinaryObject,
    ) -> Result<DisplayHandle, HandleError> {
        if let Some(handle) = self.handles.get(key) {
            return Ok(handle.clone());
        }
        let handle = self.factory.create(key, object)?;
        debug!(key = %key, handle = %handle, "Created display handle");
        self.handles.insert(key.clone(), handle.clone());
        Ok(handle)
    }

    /// Like [`try_resolve`](Self::try_resolve), degrading a platform failure
    /// to "no handle available"
    pub fn resolve(&mut self, key: &AssetKey, object: &BinaryObject) -> Option<DisplayHandle> {
        match self.try_resolve(key, object) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(key = %key, error = %e, "Rendering without preview");
                None
            }
        }
    }

    /// Release the handle for `key`. Absent keys are a no-op.
    pub fn revoke(&mut self, key: &AssetKey) -> bool {
        let Some(handle) = self.handles.remove(key) else {
            return false;
        };
        if let Err(e) = self.factory.release(&handle) {
            warn!(key = %key, error = %e, "Display handle release failed");
        } else {
            debug!(key = %key, handle = %handle, "Revoked display handle");
        }
        true
    }

    /// Revoke every live handle
    pub fn clear(&mut self) {
        let keys: Vec<AssetKey> = self.handles.keys().cloned().collect();
        for key in keys {
            self.revoke(&key);
        }
    }

    pub fn get(&self, key: &AssetKey) -> Option<&DisplayHandle> {
        self.handles.get(key)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }
}

impl<F: HandleFactory + Default> Default for HandleRegistry<F> {
    fn default() -> Self {
        Self::new(F::default())
    }
}

impl<F: HandleFactory> EvictionListener for HandleRegistry<F> {
    fn on_evict(&mut self, key: &AssetKey, _object: &BinaryObject) {
        self.revoke(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lru::LruBlobCache;

    /// Counts releases per URI so double revocation is visible
    #[derive(Default)]
    struct CountingFactory {
        next: u32,
        released: HashMap<String, u32>,
        fail_release: bool,
    }

    impl HandleFactory for CountingFactory {
        fn create(
            &mut self,
            key: &AssetKey,
            _object: &BinaryObject,
        ) -> Result<DisplayHandle, HandleError> {
            self.next += 1;
            Ok(DisplayHandle::new(format!("test:{}#{}", key, self.next)))
        }

        fn release(&mut self, handle: &DisplayHandle) -> Result<(), HandleError> {
            *self.released.entry(handle.uri().to_string()).or_default() += 1;
            if self.fail_release {
                return Err(HandleError::Revoke("platform refused".to_string()));
            }
            Ok(())
        }
    }

    fn obj() -> BinaryObject {
        BinaryObject::new(vec![0xff, 0xd8], "image/jpeg")
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let mut registry = HandleRegistry::new(CountingFactory::default());
        let key = AssetKey::new("ph-1");

        let first = registry.resolve(&key, &obj()).unwrap();
        let second = registry.resolve(&key, &obj()).unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_after_revoke_is_fresh() {
        let mut registry = HandleRegistry::new(CountingFactory::default());
        let key = AssetKey::new("ph-1");

        let first = registry.resolve(&key, &obj()).unwrap();
        assert!(registry.revoke(&key));
        let second = registry.resolve(&key, &obj()).unwrap();

        assert_ne!(first, second);
        assert_eq!(registry.factory().released[first.uri()], 1);
    }

    #[test]
    fn test_revoke_absent_key_is_noop() {
        let mut registry = HandleRegistry::new(CountingFactory::default());
        assert!(!registry.revoke(&AssetKey::new("nothing")));
        assert!(registry.factory().released.is_empty());
    }

    #[test]
    fn test_failed_release_still_forgets_handle() {
        let mut registry = HandleRegistry::new(CountingFactory {
            fail_release: true,
            ..Default::default()
        });
        let key = AssetKey::new("ph-1");
        let handle = registry.resolve(&key, &obj()).unwrap();

        assert!(registry.revoke(&key));
        assert!(!registry.revoke(&key));
        assert!(registry.get(&key).is_none());
        assert_eq!(registry.factory().released[handle.uri()], 1);
    }

    #[test]
    fn test_clear_revokes_all() {
        let mut registry = HandleRegistry::new(CountingFactory::default());
        for id in ["a", "b", "c"] {
            registry.resolve(&AssetKey::new(id), &obj());
        }

        registry.clear();

        assert!(registry.is_empty());
        assert_eq!(registry.factory().released.len(), 3);
        assert!(registry.factory().released.values().all(|&n| n == 1));
    }

    #[test]
    fn test_exhausted_factory_degrades_to_none() {
        let mut registry = HandleRegistry::new(ObjectUrlFactory::default().with_limit(1));

        assert!(registry.resolve(&AssetKey::new("a"), &obj()).is_some());
        assert!(registry.resolve(&AssetKey::new("b"), &obj()).is_none());

        registry.revoke(&AssetKey::new("a"));
        assert!(registry.resolve(&AssetKey::new("b"), &obj()).is_some());
        assert_eq!(registry.factory().live(), 1);
    }

    #[test]
    fn test_object_url_format() {
        let mut registry: HandleRegistry = HandleRegistry::default();
        let handle = registry.resolve(&AssetKey::new("a"), &obj()).unwrap();
        assert!(handle.uri().starts_with("blob:inventory/"));
    }

    #[test]
    fn test_eviction_revokes_exactly_once() {
        let mut cache = LruBlobCache::new(2);
        let mut registry = HandleRegistry::new(CountingFactory::default());

        let mut issued = Vec::new();
        for id in ["a", "b", "c", "d"] {
            let key = AssetKey::new(id);
            issued.push(registry.resolve(&key, &obj()).unwrap());
            cache.fill(key, obj(), &mut registry);
        }

        // a and b evicted; c and d still live
        let released = &registry.factory().released;
        assert_eq!(released.get(issued[0].uri()), Some(&1));
        assert_eq!(released.get(issued[1].uri()), Some(&1));
        assert_eq!(released.get(issued[2].uri()), None);
        assert_eq!(registry.len(), 2);

        // Revoking an evicted key again does nothing
        registry.revoke(&AssetKey::new("a"));
        assert_eq!(registry.factory().released[issued[0].uri()], 1);
    }
}
