//! View pipeline: fetch, resolve handles, render
//!
//! The generation for a target is taken before any asset is fetched, so a
//! request that is superseded while its fetch is still in flight never clears
//! or appends to the container. Display handles are resolved item by item as
//! nodes are built, inside a [`RenderPass`] that keeps every handle already
//! handed to a node alive until the render settles.

use crate::cache::{AssetCache, RenderPass};
use crate::config::PipelineConfig;
use crate::fetcher::BatchFetcher;
use crate::generations::RenderGenerations;
use crate::handles::{HandleFactory, ObjectUrlFactory};
use crate::render::{Container, IncrementalRenderer, NodeBuilder, RenderOutcome};
use crate::store::BlobStore;
use crate::types::{AssetKey, BinaryObject, ItemAssets, ResolvedAsset};
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub struct ViewPipeline<S, F = ObjectUrlFactory> {
    cache: AssetCache<F>,
    fetcher: BatchFetcher<S>,
    generations: RenderGenerations,
    config: PipelineConfig,
}

impl<S: BlobStore> ViewPipeline<S, ObjectUrlFactory> {
    pub fn new(store: S, config: PipelineConfig) -> Self {
        Self::with_factory(store, config, ObjectUrlFactory::default())
    }
}

impl<S: BlobStore, F: HandleFactory> ViewPipeline<S, F> {
    pub fn with_factory(store: S, config: PipelineConfig, factory: F) -> Self {
        Self {
            cache: AssetCache::with_factory(config.cache_capacity, factory),
            fetcher: BatchFetcher::new(store),
            generations: RenderGenerations::new(),
            config,
        }
    }

    pub fn cache(&self) -> &AssetCache<F> {
        &self.cache
    }

    pub fn fetcher(&self) -> &BatchFetcher<S> {
        &self.fetcher
    }

    pub fn store(&self) -> &S {
        self.fetcher.store()
    }

    pub fn generations(&self) -> &RenderGenerations {
        &self.generations
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fetch assets for `keys` with the configured concurrency
    pub async fn fetch_many(&self, keys: &[Option<AssetKey>]) -> Vec<Option<BinaryObject>> {
        self.fetcher
            .fetch_many(&self.cache, keys, self.config.fetch_concurrency)
            .await
    }

    /// Render one list view.
    ///
    /// `asset_keys` yields the asset keys an item references (a photo, a
    /// signature, ...). Each distinct key is fetched once; the builder
    /// receives the item's assets in the same slot order.
    pub async fn render_view<T, K, B, C>(
        &self,
        target: &str,
        items: &[T],
        asset_keys: K,
        builder: &B,
        container: &C,
    ) -> RenderOutcome
    where
        K: Fn(&T) -> Vec<Option<AssetKey>>,
        B: NodeBuilder<T>,
        C: Container<Node = B::Node>,
    {
        let token = self.generations.begin_generation(target);

        let per_item: Vec<Vec<Option<AssetKey>>> = items.iter().map(&asset_keys).collect();
        let mut seen = HashSet::new();
        let distinct: Vec<Option<AssetKey>> = per_item
            .iter()
            .flatten()
            .flatten()
            .filter(|key| seen.insert((*key).clone()))
            .cloned()
            .map(Some)
            .collect();

        let fetched = self.fetch_many(&distinct).await;

        if !self.generations.is_current(target, token) {
            debug!(view = target, "View superseded during asset fetch");
            return RenderOutcome::Superseded;
        }

        let by_key: HashMap<AssetKey, BinaryObject> = distinct
            .into_iter()
            .zip(fetched)
            .filter_map(|(key, object)| Some((key?, object?)))
            .collect();

        let mut pass = self.cache.begin_pass();
        let resolve = |index: usize, _item: &T| {
            Self::resolve_slots(&mut pass, &by_key, &per_item[index])
        };

        let renderer = IncrementalRenderer::new(&self.generations, self.config.render_batch_size);
        let outcome = renderer
            .render_resolving(target, token, items, resolve, builder, container)
            .await;
        // Unpins this render's assets
        drop(pass);
        outcome
    }

    fn resolve_slots(
        pass: &mut RenderPass<'_, F>,
        by_key: &HashMap<AssetKey, BinaryObject>,
        slots: &[Option<AssetKey>],
    ) -> ItemAssets {
        ItemAssets::new(
            slots
                .iter()
                .map(|slot| {
                    let key = slot.as_ref()?;
                    let object = by_key.get(key)?;
                    let handle = pass.resolve(key, object);
                    Some(ResolvedAsset {
                        key: key.clone(),
                        object: object.clone(),
                        handle,
                    })
                })
                .collect(),
        )
    }

    /// Supersede any in-flight render of `target`
    pub fn cancel(&self, target: &str) {
        self.generations.cancel(target);
    }
}
