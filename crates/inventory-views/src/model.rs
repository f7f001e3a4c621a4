//! Persisted inventory state

use crate::error::Result;
use asset_pipeline::AssetKey;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Available,
    Borrowed,
}

impl ItemStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ItemStatus::Available => "Available",
            ItemStatus::Borrowed => "Borrowed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub desc: String,
    pub status: ItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub borrowed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub borrow_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub borrow_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_return: Option<String>,
    /// Asset key of the most recent borrow/return photo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub action: String,
    pub item_id: String,
    pub item_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub borrower: Option<String>,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_return: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_photo: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryState {
    #[serde(default)]
    pub items: Vec<Item>,
    /// Oldest first
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Asset key for a stored photo or signature id. Empty ids mean "none".
pub fn asset_key(id: Option<&str>) -> Option<AssetKey> {
    id.filter(|id| !id.is_empty()).map(AssetKey::new)
}

impl InventoryState {
    /// Starter inventory used when no state file exists yet
    pub fn sample() -> Self {
        Self {
            items: vec![
                Item {
                    id: "itm-1".to_string(),
                    name: "MacBook Pro".to_string(),
                    category: "Electronics".to_string(),
                    desc: "13-inch".to_string(),
                    status: ItemStatus::Available,
                    borrowed_by: None,
                    borrow_date: None,
                    borrow_time: None,
                    expected_return: None,
                    photo: None,
                },
                Item {
                    id: "itm-2".to_string(),
                    name: "Cordless Drill".to_string(),
                    category: "Tools".to_string(),
                    desc: "Battery powered".to_string(),
                    status: ItemStatus::Borrowed,
                    borrowed_by: Some("John".to_string()),
                    borrow_date: Some("2025-08-05".to_string()),
                    borrow_time: None,
                    expected_return: Some("2025-08-10".to_string()),
                    photo: None,
                },
            ],
            history: Vec::new(),
        }
    }

    /// Load the state file, seeding it with [`InventoryState::sample`] when
    /// it does not exist. An unreadable file yields an empty inventory.
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = match fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = ?path, "No state file, seeding sample inventory");
                let state = Self::sample();
                state.save(path).await?;
                return Ok(state);
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&raw) {
            Ok(state) => Ok(state),
            Err(e) => {
                warn!(path = ?path, error = %e, "State file is corrupt, starting empty");
                Ok(Self::default())
            }
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, serde_json::to_vec_pretty(self)?).await?;
        Ok(())
    }

    /// Every asset referenced by the state, photos and signatures, in first
    /// occurrence order
    pub fn asset_keys(&self) -> Vec<AssetKey> {
        let item_photos = self.items.iter().map(|item| item.photo.as_deref());
        let history_assets = self
            .history
            .iter()
            .flat_map(|entry| [entry.photo.as_deref(), entry.sign_photo.as_deref()]);

        let mut seen = HashSet::new();
        item_photos
            .chain(history_assets)
            .filter_map(asset_key)
            .filter(|key| seen.insert(key.clone()))
            .collect()
    }
}
