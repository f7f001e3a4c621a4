//! Cancelable incremental rendering into a container
//!
//! Nodes are built into an off-container buffer and appended in chunks of
//! `batch_size`, yielding between chunks. The render's token is checked
//! before each item and before every append; once a newer render of the same
//! target has begun, the stale run stops and never touches the container
//! again.

use crate::error::NodeBuildError;
use crate::generations::{RenderGenerations, RenderToken};
use crate::types::ItemAssets;
use std::cell::RefCell;
use std::mem;
use tracing::{debug, warn};

/// A live view that rendered nodes are appended to
pub trait Container {
    type Node;

    fn clear(&self);

    /// Append a chunk of nodes in one operation
    fn append(&self, nodes: Vec<Self::Node>);
}

/// Builds one view node from an item and its pre-resolved assets
pub trait NodeBuilder<T> {
    type Node;

    fn build(&self, item: &T, assets: &ItemAssets) -> Result<Self::Node, NodeBuildError>;

    /// Content-free node used when `build` fails
    fn placeholder(&self, item: &T) -> Self::Node;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Completed { appended: usize, flushes: usize },
    Superseded,
}

impl RenderOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RenderOutcome::Completed { .. })
    }
}

/// In-memory container recording every append
#[derive(Debug)]
pub struct VecContainer<N> {
    nodes: RefCell<Vec<N>>,
    flushes: RefCell<Vec<usize>>,
}

impl<N> Default for VecContainer<N> {
    fn default() -> Self {
        Self {
            nodes: RefCell::new(Vec::new()),
            flushes: RefCell::new(Vec::new()),
        }
    }
}

impl<N: Clone> VecContainer<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> Vec<N> {
        self.nodes.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    /// Sizes of the chunks appended since the last clear
    pub fn flush_sizes(&self) -> Vec<usize> {
        self.flushes.borrow().clone()
    }

    pub fn into_nodes(self) -> Vec<N> {
        self.nodes.into_inner()
    }
}

impl<N> Container for VecContainer<N> {
    type Node = N;

    fn clear(&self) {
        self.nodes.borrow_mut().clear();
        self.flushes.borrow_mut().clear();
    }

    fn append(&self, nodes: Vec<N>) {
        self.flushes.borrow_mut().push(nodes.len());
        self.nodes.borrow_mut().extend(nodes);
    }
}

pub struct IncrementalRenderer<'g> {
    generations: &'g RenderGenerations,
    batch_size: usize,
}

impl<'g> IncrementalRenderer<'g> {
    pub fn new(generations: &'g RenderGenerations, batch_size: usize) -> Self {
        Self {
            generations,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Begin a new generation for `target` and render `items` into
    /// `container`
    pub async fn render<T, B, C>(
        &self,
        target: &str,
        items: &[T],
        assets: &[ItemAssets],
        builder: &B,
        container: &C,
    ) -> RenderOutcome
    where
        B: NodeBuilder<T>,
        C: Container<Node = B::Node>,
    {
        let token = self.generations.begin_generation(target);
        self.render_with_token(target, token, items, assets, builder, container)
            .await
    }

    /// Render under a token obtained earlier, e.g. before assets were fetched.
    ///
    /// `assets[i]` belongs to `items[i]`; a shorter slice leaves the
    /// remaining items without assets.
    pub async fn render_with_token<T, B, C>(
        &self,
        target: &str,
        token: RenderToken,
        items: &[T],
        assets: &[ItemAssets],
        builder: &B,
        container: &C,
    ) -> RenderOutcome
    where
        B: NodeBuilder<T>,
        C: Container<Node = B::Node>,
    {
        let lookup = |index: usize, _item: &T| assets.get(index).cloned().unwrap_or_default();
        self.render_resolving(target, token, items, lookup, builder, container)
            .await
    }

    /// Render under `token`, asking `resolve` for each item's assets
    /// immediately before its node is built. Items after a supersession are
    /// never resolved.
    pub async fn render_resolving<T, R, B, C>(
        &self,
        target: &str,
        token: RenderToken,
        items: &[T],
        mut resolve: R,
        builder: &B,
        container: &C,
    ) -> RenderOutcome
    where
        R: FnMut(usize, &T) -> ItemAssets,
        B: NodeBuilder<T>,
        C: Container<Node = B::Node>,
    {
        if !self.generations.is_current(target, token) {
            debug!(view = target, generation = token.generation(), "Render superseded before start");
            return RenderOutcome::Superseded;
        }

        container.clear();

        let mut buffer = Vec::with_capacity(self.batch_size.min(items.len()));
        let mut appended = 0;
        let mut flushes = 0;

        for (index, item) in items.iter().enumerate() {
            if !self.generations.is_current(target, token) {
                debug!(view = target, generation = token.generation(), index, "Render superseded");
                return RenderOutcome::Superseded;
            }

            let item_assets = resolve(index, item);
            let node = match builder.build(item, &item_assets) {
                Ok(node) => node,
                Err(e) => {
                    warn!(view = target, index, error = %e, "Rendering placeholder");
                    builder.placeholder(item)
                }
            };
            buffer.push(node);

            if (index + 1) % self.batch_size == 0 {
                if !self.generations.is_current(target, token) {
                    debug!(view = target, generation = token.generation(), index, "Render superseded");
                    return RenderOutcome::Superseded;
                }
                appended += buffer.len();
                flushes += 1;
                container.append(mem::take(&mut buffer));
                tokio::task::yield_now().await;
            }
        }

        if !self.generations.is_current(target, token) {
            debug!(view = target, generation = token.generation(), "Render superseded at final flush");
            return RenderOutcome::Superseded;
        }
        if !buffer.is_empty() {
            appended += buffer.len();
            flushes += 1;
            container.append(buffer);
        }

        debug!(view = target, appended, flushes, "Render completed");
        RenderOutcome::Completed { appended, flushes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Labels;

    impl NodeBuilder<u32> for Labels {
        type Node = String;

        fn build(&self, item: &u32, _assets: &ItemAssets) -> Result<String, NodeBuildError> {
            if *item == 13 {
                return Err(NodeBuildError::new("unlucky item"));
            }
            Ok(format!("item-{}", item))
        }

        fn placeholder(&self, _item: &u32) -> String {
            String::new()
        }
    }

    #[tokio::test]
    async fn test_fifty_items_in_three_flushes() {
        let gens = RenderGenerations::new();
        let renderer = IncrementalRenderer::new(&gens, 20);
        let container = VecContainer::new();
        let items: Vec<u32> = (100..150).collect();

        let outcome = renderer.render("list", &items, &[], &Labels, &container).await;

        assert_eq!(outcome, RenderOutcome::Completed { appended: 50, flushes: 3 });
        assert_eq!(container.flush_sizes(), vec![20, 20, 10]);
        assert_eq!(container.len(), 50);
        assert_eq!(container.nodes()[0], "item-100");
        assert_eq!(container.nodes()[49], "item-149");
    }

    #[tokio::test]
    async fn test_failed_item_becomes_placeholder() {
        let gens = RenderGenerations::new();
        let renderer = IncrementalRenderer::new(&gens, 4);
        let container = VecContainer::new();

        renderer
            .render("list", &[12, 13, 14], &[], &Labels, &container)
            .await;

        assert_eq!(container.nodes(), vec!["item-12", "", "item-14"]);
    }

    #[tokio::test]
    async fn test_render_clears_previous_contents() {
        let gens = RenderGenerations::new();
        let renderer = IncrementalRenderer::new(&gens, 2);
        let container = VecContainer::new();

        renderer.render("list", &[1, 2, 3], &[], &Labels, &container).await;
        renderer.render("list", &[7], &[], &Labels, &container).await;

        assert_eq!(container.nodes(), vec!["item-7"]);
    }

    #[tokio::test]
    async fn test_empty_list_completes_with_empty_container() {
        let gens = RenderGenerations::new();
        let renderer = IncrementalRenderer::new(&gens, 20);
        let container = VecContainer::new();
        container.append(vec!["stale".to_string()]);

        let outcome = renderer.render("list", &[], &[], &Labels, &container).await;

        assert_eq!(outcome, RenderOutcome::Completed { appended: 0, flushes: 0 });
        assert!(container.is_empty());
    }

    #[tokio::test]
    async fn test_stale_token_never_touches_container() {
        let gens = RenderGenerations::new();
        let renderer = IncrementalRenderer::new(&gens, 20);
        let container = VecContainer::new();

        let stale = gens.begin_generation("list");
        renderer.render("list", &[1, 2], &[], &Labels, &container).await;

        let outcome = renderer
            .render_with_token("list", stale, &[9, 9, 9], &[], &Labels, &container)
            .await;

        assert_eq!(outcome, RenderOutcome::Superseded);
        assert_eq!(container.nodes(), vec!["item-1", "item-2"]);
    }

    #[tokio::test]
    async fn test_concurrent_render_suppresses_older_run() {
        let gens = RenderGenerations::new();
        let renderer = IncrementalRenderer::new(&gens, 20);
        let container = VecContainer::new();
        let items_a: Vec<u32> = (0..100).collect();
        let items_b: Vec<u32> = (500..530).collect();

        let (a, b) = futures::join!(
            renderer.render("list", &items_a, &[], &Labels, &container),
            async {
                tokio::task::yield_now().await;
                renderer.render("list", &items_b, &[], &Labels, &container).await
            }
        );

        assert_eq!(a, RenderOutcome::Superseded);
        assert!(b.is_completed());

        let expected: Vec<String> = items_b.iter().map(|i| format!("item-{}", i)).collect();
        assert_eq!(container.nodes(), expected);
        assert_eq!(container.flush_sizes(), vec![20, 10]);
    }

    #[tokio::test]
    async fn test_other_targets_are_unaffected() {
        let gens = RenderGenerations::new();
        let renderer = IncrementalRenderer::new(&gens, 2);
        let dashboard = VecContainer::new();
        let history = VecContainer::new();

        let (d, h) = futures::join!(
            renderer.render("dashboard", &[1, 2, 3, 4, 5], &[], &Labels, &dashboard),
            renderer.render("history", &[6, 7, 8], &[], &Labels, &history),
        );

        assert!(d.is_completed());
        assert!(h.is_completed());
        assert_eq!(dashboard.len(), 5);
        assert_eq!(history.len(), 3);
    }
}
