//! End-to-end behaviour of the cache, fetcher and renderer together

use asset_pipeline::{
    AssetCache, AssetKey, BatchFetcher, BinaryObject, BlobStore, DisplayHandle, FsBlobStore,
    HandleError, HandleFactory, ItemAssets, MemoryBlobStore, NodeBuildError, NodeBuilder, PipelineConfig,
    RenderOutcome, Result, StorageError, VecContainer, ViewPipeline,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Store whose reads take a per-key delay, with optional failing keys
#[derive(Default)]
struct SlowStore {
    objects: HashMap<AssetKey, BinaryObject>,
    delays_ms: HashMap<AssetKey, u64>,
    failing: Vec<AssetKey>,
    reads: AtomicUsize,
}

impl SlowStore {
    fn with(mut self, id: &str, delay_ms: u64) -> Self {
        let key = AssetKey::new(id);
        self.objects
            .insert(key.clone(), BinaryObject::new(id.as_bytes(), "image/webp"));
        self.delays_ms.insert(key, delay_ms);
        self
    }

    fn failing(mut self, id: &str) -> Self {
        self.failing.push(AssetKey::new(id));
        self
    }
}

#[async_trait]
impl BlobStore for SlowStore {
    async fn open(&self) -> Result<()> {
        Ok(())
    }

    async fn put(&self, key: &AssetKey, _object: BinaryObject) -> Result<AssetKey> {
        Ok(key.clone())
    }

    async fn get(&self, key: &AssetKey) -> Result<Option<BinaryObject>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(ms) = self.delays_ms.get(key) {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
        }
        if self.failing.contains(key) {
            return Err(StorageError::Unavailable(format!("cannot read {}", key)));
        }
        Ok(self.objects.get(key).cloned())
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }
}

/// Handle factory that records how often each URI is released
#[derive(Default)]
struct AuditedFactory {
    issued: u32,
    releases: HashMap<String, u32>,
}

impl HandleFactory for AuditedFactory {
    fn create(
        &mut self,
        key: &AssetKey,
        _object: &BinaryObject,
    ) -> std::result::Result<DisplayHandle, HandleError> {
        self.issued += 1;
        Ok(DisplayHandle::new(format!("audit:{}/{}", key, self.issued)))
    }

    fn release(&mut self, handle: &DisplayHandle) -> std::result::Result<(), HandleError> {
        *self.releases.entry(handle.uri().to_string()).or_default() += 1;
        Ok(())
    }
}

struct Dashboard;

impl NodeBuilder<(String, Option<String>)> for Dashboard {
    type Node = String;

    fn build(
        &self,
        item: &(String, Option<String>),
        assets: &ItemAssets,
    ) -> std::result::Result<String, NodeBuildError> {
        let preview = assets.primary().and_then(|a| a.handle.as_ref());
        Ok(match preview {
            Some(handle) => format!("{} [{}]", item.0, handle),
            None => item.0.clone(),
        })
    }

    fn placeholder(&self, _item: &(String, Option<String>)) -> String {
        "<placeholder>".to_string()
    }
}

fn item(name: &str, photo: Option<&str>) -> (String, Option<String>) {
    (name.to_string(), photo.map(str::to_string))
}

fn photo_key(item: &(String, Option<String>)) -> Vec<Option<AssetKey>> {
    vec![item.1.as_deref().map(AssetKey::new)]
}

#[tokio::test]
async fn test_fetch_many_preserves_order_despite_latency() {
    let store = SlowStore::default()
        .with("slow", 40)
        .with("medium", 15)
        .with("fast", 0);
    let fetcher = BatchFetcher::new(store);
    let cache = AssetCache::new(10);

    let keys: Vec<Option<AssetKey>> = ["slow", "medium", "fast", "slow"]
        .iter()
        .map(|id| Some(AssetKey::new(*id)))
        .chain([None])
        .collect();

    let results = fetcher.fetch_many(&cache, &keys, 3).await;

    let names: Vec<Option<&[u8]>> = results
        .iter()
        .map(|r| r.as_ref().map(BinaryObject::bytes))
        .collect();
    assert_eq!(
        names,
        vec![
            Some(&b"slow"[..]),
            Some(&b"medium"[..]),
            Some(&b"fast"[..]),
            Some(&b"slow"[..]),
            None
        ]
    );
    // The second "slow" is a cache hit from the first window
    assert_eq!(fetcher.store().reads.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_one_failed_read_does_not_spoil_its_window() {
    let store = SlowStore::default()
        .with("k1", 5)
        .with("k2", 1)
        .with("k3", 10)
        .failing("k2");
    let fetcher = BatchFetcher::new(store);
    let cache = AssetCache::new(10);

    let keys = vec![
        Some(AssetKey::new("k1")),
        Some(AssetKey::new("k2")),
        Some(AssetKey::new("k3")),
    ];
    let results = fetcher.fetch_many(&cache, &keys, 3).await;

    assert!(results[0].is_some());
    assert!(results[1].is_none());
    assert!(results[2].is_some());
    assert!(!cache.contains(&AssetKey::new("k2")));
}

#[tokio::test]
async fn test_every_evicted_handle_is_revoked_exactly_once() {
    let cache = AssetCache::with_factory(3, AuditedFactory::default());
    let mut issued = Vec::new();

    for round in 0..3 {
        for i in 0..6u8 {
            let key = AssetKey::new(format!("k{}", i));
            let object = BinaryObject::new(vec![i, round], "image/webp");
            if let Some(handle) = cache.handle_for(&key, &object) {
                if !issued.contains(&handle) {
                    issued.push(handle);
                }
            }
        }
    }
    cache.clear();

    cache.with_factory_ref(|factory| {
        assert_eq!(factory.releases.len(), issued.len());
        for handle in &issued {
            assert_eq!(factory.releases.get(handle.uri()), Some(&1), "{}", handle);
        }
    });
}

#[tokio::test]
async fn test_superseded_view_leaves_only_latest_output() {
    let mut store = SlowStore::default();
    for i in 0..60 {
        store = store.with(&format!("a{}", i), 1);
    }
    let config = PipelineConfig {
        cache_capacity: 200,
        fetch_concurrency: 8,
        render_batch_size: 20,
    };
    let pipeline = ViewPipeline::new(store, config);
    let container = VecContainer::new();

    let items_a: Vec<_> = (0..60)
        .map(|i| item(&format!("A{}", i), Some(&format!("a{}", i))))
        .collect();
    let items_b: Vec<_> = (0..25).map(|i| item(&format!("B{}", i), None)).collect();

    let (a, b) = futures::join!(
        pipeline.render_view("list", &items_a, photo_key, &Dashboard, &container),
        async {
            tokio::time::sleep(Duration::from_millis(2)).await;
            pipeline
                .render_view("list", &items_b, photo_key, &Dashboard, &container)
                .await
        }
    );

    assert_eq!(a, RenderOutcome::Superseded);
    assert_eq!(b, RenderOutcome::Completed { appended: 25, flushes: 2 });

    let alone = VecContainer::new();
    pipeline
        .render_view("solo", &items_b, photo_key, &Dashboard, &alone)
        .await;
    assert_eq!(container.nodes(), alone.nodes());
}

#[tokio::test]
async fn test_view_with_images_attaches_live_handles() {
    let store = MemoryBlobStore::new();
    store
        .put(&AssetKey::new("ph-1"), BinaryObject::new(b"jpeg".to_vec(), "image/jpeg"))
        .await
        .unwrap();
    let pipeline = ViewPipeline::new(store, PipelineConfig::default());
    let container = VecContainer::new();

    let items = vec![
        item("MacBook Pro", Some("ph-1")),
        item("Cordless Drill", None),
        item("Projector", Some("ph-missing")),
    ];
    pipeline
        .render_view("dashboard", &items, photo_key, &Dashboard, &container)
        .await;

    let nodes = container.nodes();
    let handle = pipeline.cache().handle(&AssetKey::new("ph-1")).unwrap();
    assert_eq!(nodes[0], format!("MacBook Pro [{}]", handle));
    assert_eq!(nodes[1], "Cordless Drill");
    assert_eq!(nodes[2], "Projector");
}

#[tokio::test]
async fn test_rerender_reuses_cached_assets_and_handles() {
    let store = MemoryBlobStore::new();
    store
        .put(&AssetKey::new("ph-1"), BinaryObject::new(b"jpeg".to_vec(), "image/jpeg"))
        .await
        .unwrap();
    let pipeline = ViewPipeline::new(store, PipelineConfig::default());
    let items = vec![item("MacBook Pro", Some("ph-1"))];

    let first = VecContainer::new();
    pipeline
        .render_view("dashboard", &items, photo_key, &Dashboard, &first)
        .await;
    let second = VecContainer::new();
    pipeline
        .render_view("dashboard", &items, photo_key, &Dashboard, &second)
        .await;

    assert_eq!(first.nodes(), second.nodes());
    let stats = pipeline.cache().stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.live_handles, 1);
}

#[tokio::test]
async fn test_filesystem_store_backs_a_view() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsBlobStore::new(dir.path().join("blobs"));
    store
        .put(&AssetKey::new("ph-1"), BinaryObject::new(b"webp".to_vec(), "image/webp"))
        .await
        .unwrap();
    let pipeline = ViewPipeline::new(store, PipelineConfig::default());
    let container = VecContainer::new();

    let items: Vec<_> = (0..45)
        .map(|i| item(&format!("Item {}", i), (i % 3 == 0).then_some("ph-1")))
        .collect();
    let outcome = pipeline
        .render_view("dashboard", &items, photo_key, &Dashboard, &container)
        .await;

    assert_eq!(outcome, RenderOutcome::Completed { appended: 45, flushes: 3 });
    assert_eq!(container.flush_sizes(), vec![20, 20, 5]);
    assert!(container.nodes()[0].starts_with("Item 0 [blob:"));
    assert_eq!(container.nodes()[1], "Item 1");
    assert_eq!(pipeline.cache().stats().misses, 1);
}
