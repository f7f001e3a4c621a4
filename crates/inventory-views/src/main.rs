//! Inventory views - borrow-tracking list views over cached photo assets
//!
//! Loads the inventory state, renders the dashboard, history and manage
//! views through the asset pipeline, and exports or restores full backups.

mod config;
mod error;
mod model;
mod views;

use crate::config::ViewsConfig;
use crate::error::Result;
use crate::model::{InventoryState, ItemStatus};
use crate::views::{
    dashboard_items, history_asset_keys, history_entries, item_asset_keys, manage_items, Card,
    DashboardCards, HistoryCards, ItemFilter, ManageCards, ViewName,
};
use asset_pipeline::{
    export_backup, import_backup, AssetKey, BlobStore, FsBlobStore, NodeBuilder, RenderOutcome,
    VecContainer, ViewPipeline,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

type Pipeline = ViewPipeline<FsBlobStore>;

#[derive(Parser)]
#[command(name = "inventory-views", about = "Inventory list views and backups")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render one list view to stdout
    Render {
        view: ViewName,
        /// Only show items with this status (dashboard, manage)
        #[arg(long)]
        status: Option<ItemStatus>,
        /// Case-insensitive search over name, category and description
        #[arg(long, short)]
        query: Option<String>,
        /// Limit history to one month (YYYY-MM)
        #[arg(long)]
        month: Option<String>,
    },
    /// Write a full backup (state plus every referenced asset)
    Export { path: PathBuf },
    /// Replace the state and asset store with a backup
    Import { path: PathBuf },
    /// Render every view and print inventory and cache statistics
    Stats,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive("inventory_views=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    };

    let cli = Cli::parse();

    let config = ViewsConfig::from_env();
    info!("State file: {:?}", config.state_path);
    info!("Blob dir: {:?}", config.blob_dir);
    info!("Cache capacity: {}", config.pipeline.cache_capacity);

    let state = InventoryState::load(&config.state_path).await?;
    let pipeline = ViewPipeline::new(FsBlobStore::new(&config.blob_dir), config.pipeline.clone());
    pipeline.store().open().await?;

    match cli.command {
        Command::Render {
            view,
            status,
            query,
            month,
        } => {
            let filter = ItemFilter { status, query };
            if let Some(cards) = render(&pipeline, &state, view, &filter, month.as_deref()).await {
                print_cards(view, &cards);
            }
        }
        Command::Export { path } => {
            let document = export_backup(
                serde_json::to_value(&state)?,
                state.asset_keys(),
                pipeline.cache(),
                pipeline.fetcher(),
                pipeline.config().fetch_concurrency,
            )
            .await;
            tokio::fs::write(&path, serde_json::to_vec_pretty(&document)?).await?;
            info!(
                path = ?path,
                items = state.items.len(),
                assets = document.photos.len(),
                "Backup written"
            );
        }
        Command::Import { path } => {
            let raw = tokio::fs::read_to_string(&path).await?;
            let summary = import_backup(&raw, pipeline.cache(), pipeline.store()).await?;
            let restored: InventoryState = serde_json::from_value(summary.state)?;
            restored.save(&config.state_path).await?;
            info!(
                items = restored.items.len(),
                history = restored.history.len(),
                assets = summary.restored,
                skipped = summary.skipped,
                "Backup restored"
            );
            if summary.failed > 0 {
                warn!(failed = summary.failed, "Some assets could not be written to the store");
            }
        }
        Command::Stats => {
            for view in [ViewName::Dashboard, ViewName::History, ViewName::Manage] {
                render(&pipeline, &state, view, &ItemFilter::default(), None).await;
            }
            let available = state
                .items
                .iter()
                .filter(|item| item.status == ItemStatus::Available)
                .count();
            let summary = serde_json::json!({
                "items": state.items.len(),
                "available": available,
                "borrowed": state.items.len() - available,
                "history": state.history.len(),
                "assets": state.asset_keys().len(),
                "cache": pipeline.cache().stats(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

/// Render `view` and return its cards, or `None` if the render was
/// superseded
async fn render(
    pipeline: &Pipeline,
    state: &InventoryState,
    view: ViewName,
    filter: &ItemFilter,
    month: Option<&str>,
) -> Option<Vec<Card>> {
    match view {
        ViewName::Dashboard => {
            let items = dashboard_items(state, filter);
            render_items(pipeline, view, &items, item_asset_keys, &DashboardCards).await
        }
        ViewName::History => {
            let entries = history_entries(state, month);
            render_items(pipeline, view, &entries, history_asset_keys, &HistoryCards).await
        }
        ViewName::Manage => {
            let items = manage_items(state, filter);
            render_items(pipeline, view, &items, |_| Vec::new(), &ManageCards).await
        }
    }
}

async fn render_items<T, B>(
    pipeline: &Pipeline,
    view: ViewName,
    items: &[T],
    asset_keys: impl Fn(&T) -> Vec<Option<AssetKey>>,
    builder: &B,
) -> Option<Vec<Card>>
where
    B: NodeBuilder<T, Node = Card>,
{
    let container = VecContainer::new();
    match pipeline
        .render_view(view.target(), items, asset_keys, builder, &container)
        .await
    {
        RenderOutcome::Completed { appended, flushes } => {
            info!(view = view.target(), appended, flushes, "View rendered");
            Some(container.into_nodes())
        }
        RenderOutcome::Superseded => {
            warn!(view = view.target(), "View render was superseded");
            None
        }
    }
}

fn print_cards(view: ViewName, cards: &[Card]) {
    if cards.is_empty() {
        println!("{}", view.empty_message());
        return;
    }
    for card in cards {
        println!("{}", card);
    }
}
