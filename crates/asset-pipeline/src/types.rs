//! Core asset types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque identifier for one stored binary object (photo or signature)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetKey(String);

impl AssetKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for AssetKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Raw bytes plus a content type.
///
/// Cloning is cheap: the bytes are shared, so the cache and any in-flight
/// render hold the same allocation as the value read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryObject {
    data: Arc<[u8]>,
    content_type: Arc<str>,
}

impl BinaryObject {
    pub fn new(data: impl Into<Vec<u8>>, content_type: &str) -> Self {
        let data: Vec<u8> = data.into();
        Self {
            data: Arc::from(data),
            content_type: Arc::from(content_type),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A revocable, renderable reference to one BinaryObject
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisplayHandle {
    uri: String,
}

impl DisplayHandle {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl fmt::Display for DisplayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

/// An asset fetched for a render pass, with its display handle if one could
/// be created
#[derive(Debug, Clone)]
pub struct ResolvedAsset {
    pub key: AssetKey,
    pub object: BinaryObject,
    pub handle: Option<DisplayHandle>,
}

/// The assets one list item references, in the order the item declared them.
///
/// A slot is `None` when the item had no key there or the asset could not be
/// loaded.
#[derive(Debug, Clone, Default)]
pub struct ItemAssets(Vec<Option<ResolvedAsset>>);

impl ItemAssets {
    pub fn new(slots: Vec<Option<ResolvedAsset>>) -> Self {
        Self(slots)
    }

    /// First slot, for items that carry a single photo
    pub fn primary(&self) -> Option<&ResolvedAsset> {
        self.get(0)
    }

    pub fn get(&self, index: usize) -> Option<&ResolvedAsset> {
        self.0.get(index).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Statistics about the asset cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub live_handles: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}
