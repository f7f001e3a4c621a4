//! Asset pipeline
//!
//! Bridges a durable blob store, a bounded in-memory LRU cache and revocable
//! display handles, and renders long image-bearing lists in cancelable
//! chunks. Everything runs on one logical thread with explicit yield points;
//! shared instances are passed by reference rather than locked.

pub mod backup;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod file_store;
pub mod generations;
pub mod handles;
pub mod lru;
pub mod pipeline;
pub mod render;
pub mod store;
pub mod types;

pub use backup::{export_backup, import_backup, BackupDocument, ImportSummary};
pub use cache::{AssetCache, RenderPass};
pub use config::PipelineConfig;
pub use error::{BackupError, HandleError, NodeBuildError, Result, StorageError};
pub use fetcher::BatchFetcher;
pub use file_store::FsBlobStore;
pub use generations::{RenderGenerations, RenderToken};
pub use handles::{HandleFactory, HandleRegistry, ObjectUrlFactory};
pub use lru::{EvictionListener, LruBlobCache};
pub use pipeline::ViewPipeline;
pub use render::{Container, IncrementalRenderer, NodeBuilder, RenderOutcome, VecContainer};
pub use store::{BlobStore, MemoryBlobStore};
pub use types::{AssetKey, BinaryObject, CacheStats, DisplayHandle, ItemAssets, ResolvedAsset};
