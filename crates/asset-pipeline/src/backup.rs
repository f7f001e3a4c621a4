//! Full backup export/import
//!
//! A backup is a JSON document holding the opaque application state and
//! every referenced asset as a `data:` URL:
//!
//! ```json
//! { "state": { ... }, "photos": { "<key>": "data:image/webp;base64,..." }, "exportedAt": "..." }
//! ```

use crate::cache::AssetCache;
use crate::error::BackupError;
use crate::fetcher::BatchFetcher;
use crate::handles::HandleFactory;
use crate::store::BlobStore;
use crate::types::{AssetKey, BinaryObject};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub state: serde_json::Value,
    pub photos: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub state: serde_json::Value,
    pub restored: usize,
    /// Entries that were not valid data URLs
    pub skipped: usize,
    /// Entries the store failed to write
    pub failed: usize,
}

pub fn encode_data_url(object: &BinaryObject) -> String {
    format!(
        "data:{};base64,{}",
        object.content_type(),
        STANDARD.encode(object.bytes())
    )
}

/// Decode a base64 `data:` URL. A missing media type defaults to
/// `application/octet-stream`.
pub fn decode_data_url(url: &str) -> Result<BinaryObject, BackupError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| BackupError::InvalidDataUrl("missing data: scheme".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| BackupError::InvalidDataUrl("missing payload separator".to_string()))?;
    let media_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| BackupError::InvalidDataUrl("only base64 payloads are supported".to_string()))?;
    let content_type = if media_type.is_empty() {
        "application/octet-stream"
    } else {
        media_type
    };
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| BackupError::InvalidDataUrl(e.to_string()))?;
    Ok(BinaryObject::new(bytes, content_type))
}

/// Build a backup of `state` and the assets it references.
///
/// Assets are read through the cache in fetch windows; keys whose asset is
/// missing or unreadable are left out of the document.
pub async fn export_backup<S, F>(
    state: serde_json::Value,
    keys: impl IntoIterator<Item = AssetKey>,
    cache: &AssetCache<F>,
    fetcher: &BatchFetcher<S>,
    concurrency_limit: usize,
) -> BackupDocument
where
    S: BlobStore,
    F: HandleFactory,
{
    let mut seen = HashSet::new();
    let keys: Vec<Option<AssetKey>> = keys
        .into_iter()
        .filter(|key| seen.insert(key.clone()))
        .map(Some)
        .collect();
    let total = keys.len();

    let objects = fetcher.fetch_many(cache, &keys, concurrency_limit).await;

    let mut photos = BTreeMap::new();
    for (index, (key, object)) in keys.into_iter().zip(objects).enumerate() {
        if let (Some(key), Some(object)) = (key, object) {
            photos.insert(key.to_string(), encode_data_url(&object));
        }
        info!(done = index + 1, total, "Backing up assets");
        tokio::task::yield_now().await;
    }

    if photos.len() < total {
        warn!(missing = total - photos.len(), "Some assets were not included in the backup");
    }

    BackupDocument {
        state,
        photos,
        exported_at: Some(Utc::now()),
    }
}

/// Parse a backup document, requiring both `state` and `photos`
pub fn parse_backup(raw: &str) -> Result<BackupDocument, BackupError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    let object = value
        .as_object()
        .ok_or_else(|| BackupError::InvalidJson("top level is not an object".to_string()))?;
    for section in ["state", "photos"] {
        if object.get(section).map_or(true, serde_json::Value::is_null) {
            return Err(BackupError::MissingSection(section));
        }
    }
    Ok(serde_json::from_value(value)?)
}

/// Replace the store's contents with the backup's assets.
///
/// An invalid document fails before the store is touched. Otherwise the
/// store is cleared and the cache is cleared right after it, revoking every
/// display handle issued before the restore. Undecodable entries and failed
/// writes are logged and counted; the restored state is returned either way
/// so it can be saved alongside whatever assets made it into the store.
pub async fn import_backup<S, F>(
    raw: &str,
    cache: &AssetCache<F>,
    store: &S,
) -> Result<ImportSummary, BackupError>
where
    S: BlobStore,
    F: HandleFactory,
{
    let document = parse_backup(raw)?;

    store.clear().await?;
    cache.clear();

    let total = document.photos.len();
    let mut restored = 0;
    let mut skipped = 0;
    let mut failed = 0;
    for (index, (key, url)) in document.photos.iter().enumerate() {
        match decode_data_url(url) {
            Ok(object) => match store.put(&AssetKey::new(key.as_str()), object).await {
                Ok(_) => restored += 1,
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to restore asset");
                    failed += 1;
                }
            },
            Err(e) => {
                warn!(key = %key, error = %e, "Skipping asset in backup");
                skipped += 1;
            }
        }
        info!(done = index + 1, total, "Restoring assets");
        tokio::task::yield_now().await;
    }

    Ok(ImportSummary {
        state: document.state,
        restored,
        skipped,
        failed,
    })
}
