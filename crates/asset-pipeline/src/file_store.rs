//! Directory-backed BlobStore
//!
//! Each object is written as `<sha256(key)>` with a `<sha256(key)>.meta.json`
//! sidecar. The sidecar is written last and acts as the commit marker: an
//! object without one does not exist, and a sidecar whose size disagrees with
//! the data file is reported as corrupt rather than returning partial bytes.

use crate::error::{Result, StorageError};
use crate::store::BlobStore;
use crate::types::{AssetKey, BinaryObject};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ObjectMeta {
    key: AssetKey,
    content_type: String,
    size: u64,
    stored_at: DateTime<Utc>,
}

pub struct FsBlobStore {
    root: PathBuf,
    opened: OnceCell<()>,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            opened: OnceCell::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File stem for a key
    pub fn object_name(key: &AssetKey) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_str().as_bytes());
        hex::encode(hasher.finalize())
    }

    fn data_path(&self, key: &AssetKey) -> PathBuf {
        self.root.join(Self::object_name(key))
    }

    fn meta_path(&self, key: &AssetKey) -> PathBuf {
        self.root.join(format!("{}.meta.json", Self::object_name(key)))
    }

    async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn open(&self) -> Result<()> {
        self.opened
            .get_or_try_init(|| async {
                fs::create_dir_all(&self.root).await.map_err(|e| {
                    StorageError::Open(format!("{}: {}", self.root.display(), e))
                })?;
                info!(root = ?self.root, "Blob store opened");
                Ok::<(), StorageError>(())
            })
            .await?;
        Ok(())
    }

    async fn put(&self, key: &AssetKey, object: BinaryObject) -> Result<AssetKey> {
        self.open().await?;

        Self::write_atomic(&self.data_path(key), object.bytes()).await?;

        let meta = ObjectMeta {
            key: key.clone(),
            content_type: object.content_type().to_string(),
            size: object.len() as u64,
            stored_at: Utc::now(),
        };
        Self::write_atomic(&self.meta_path(key), &serde_json::to_vec(&meta)?).await?;

        debug!(key = %key, size = meta.size, "Stored blob");
        Ok(key.clone())
    }

    async fn get(&self, key: &AssetKey) -> Result<Option<BinaryObject>> {
        self.open().await?;

        let raw_meta = match fs::read(self.meta_path(key)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let meta: ObjectMeta = serde_json::from_slice(&raw_meta)?;

        let data = match fs::read(self.data_path(key)).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(key = %key, "Blob metadata present without data");
                return Err(StorageError::Codec(format!("missing data for {}", key)));
            }
            Err(e) => return Err(e.into()),
        };

        if data.len() as u64 != meta.size {
            return Err(StorageError::Codec(format!(
                "size mismatch for {}: expected {}, found {}",
                key,
                meta.size,
                data.len()
            )));
        }

        Ok(Some(BinaryObject::new(data, &meta.content_type)))
    }

    async fn clear(&self) -> Result<()> {
        self.open().await?;

        let mut dir = fs::read_dir(&self.root).await?;
        let mut removed = 0usize;
        while let Some(entry) = dir.next_entry().await? {
            if entry.file_type().await?.is_file() {
                fs::remove_file(entry.path()).await?;
                removed += 1;
            }
        }

        info!(removed, "Blob store cleared");
        Ok(())
    }
}
