//! Host configuration

use asset_pipeline::PipelineConfig;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ViewsConfig {
    pub state_path: PathBuf,
    pub blob_dir: PathBuf,
    pub pipeline: PipelineConfig,
}

impl ViewsConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let state_path = lookup("INVENTORY_STATE")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/state.json"));

        let blob_dir = lookup("BLOB_DIR")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/blobs"));

        Self {
            state_path,
            blob_dir,
            pipeline: PipelineConfig::from_lookup(lookup),
        }
    }
}
