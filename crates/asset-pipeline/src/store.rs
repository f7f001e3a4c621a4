//! BlobStore collaborator
//!
//! The durable key to binary-object store. The pipeline only ever reads
//! through it on a cache miss; writes come from capture/import.

use crate::error::Result;
use crate::types::{AssetKey, BinaryObject};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Prepare the store. Idempotent; `get`/`put` call it lazily.
    async fn open(&self) -> Result<()>;

    /// Persist an object under `key`, returning the key
    async fn put(&self, key: &AssetKey, object: BinaryObject) -> Result<AssetKey>;

    /// Read an object. Never returns partial data.
    async fn get(&self, key: &AssetKey) -> Result<Option<BinaryObject>>;

    /// Remove every stored object
    async fn clear(&self) -> Result<()>;
}

#[async_trait]
impl<S: BlobStore + ?Sized> BlobStore for Arc<S> {
    async fn open(&self) -> Result<()> {
        (**self).open().await
    }

    async fn put(&self, key: &AssetKey, object: BinaryObject) -> Result<AssetKey> {
        (**self).put(key, object).await
    }

    async fn get(&self, key: &AssetKey) -> Result<Option<BinaryObject>> {
        (**self).get(key).await
    }

    async fn clear(&self) -> Result<()> {
        (**self).clear().await
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<AssetKey, BinaryObject>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn open(&self) -> Result<()> {
        Ok(())
    }

    async fn put(&self, key: &AssetKey, object: BinaryObject) -> Result<AssetKey> {
        self.objects.write().await.insert(key.clone(), object);
        Ok(key.clone())
    }

    async fn get(&self, key: &AssetKey) -> Result<Option<BinaryObject>> {
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn clear(&self) -> Result<()> {
        self.objects.write().await.clear();
        Ok(())
    }
}
