//! Dashboard, history and manage list views
//!
//! Each view selects and orders its items from the inventory state, names the
//! assets every item needs, and builds a text card per item from the assets
//! the pipeline resolved.

use crate::model::{asset_key, HistoryEntry, InventoryState, Item, ItemStatus};
use asset_pipeline::{AssetKey, ItemAssets, NodeBuildError, NodeBuilder};
use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ViewName {
    Dashboard,
    History,
    Manage,
}

impl ViewName {
    /// Render target the view's generations are scoped to
    pub fn target(&self) -> &'static str {
        match self {
            ViewName::Dashboard => "dashboard",
            ViewName::History => "history",
            ViewName::Manage => "manage",
        }
    }

    pub fn empty_message(&self) -> &'static str {
        match self {
            ViewName::History => "No history for this period.",
            _ => "No items found.",
        }
    }
}

/// A rendered text card. A card with no lines is the placeholder for an item
/// that could not be built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Card {
    pub lines: Vec<String>,
}

impl Card {
    fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn is_placeholder(&self) -> bool {
        self.lines.is_empty()
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_placeholder() {
            return writeln!(f, "| (unavailable)");
        }
        for line in &self.lines {
            writeln!(f, "| {}", line)?;
        }
        Ok(())
    }
}

/// Status and free-text filter shared by the dashboard and manage views
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub status: Option<ItemStatus>,
    pub query: Option<String>,
}

impl ItemFilter {
    fn matches(&self, item: &Item, include_borrower: bool) -> bool {
        if self.status.is_some_and(|status| status != item.status) {
            return false;
        }
        let query = match self.query.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => q.to_lowercase(),
            _ => return true,
        };
        let mut fields = vec![&item.name, &item.category, &item.desc];
        if include_borrower {
            fields.extend(item.borrowed_by.as_ref());
        }
        fields
            .into_iter()
            .any(|field| field.to_lowercase().contains(&query))
    }
}

/// Format a `YYYY-MM-DD` date as `d/m/yyyy`; anything else is shown verbatim
pub fn format_date(raw: &str) -> String {
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => date.format("%-d/%-m/%Y").to_string(),
        Err(_) => raw.to_string(),
    }
}

fn month_of(raw: &str) -> Option<String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| date.format("%Y-%m").to_string())
}

pub fn dashboard_items(state: &InventoryState, filter: &ItemFilter) -> Vec<Item> {
    state
        .items
        .iter()
        .filter(|item| filter.matches(item, true))
        .cloned()
        .collect()
}

/// History entries newest first, optionally limited to one `YYYY-MM` month
pub fn history_entries(state: &InventoryState, month: Option<&str>) -> Vec<HistoryEntry> {
    state
        .history
        .iter()
        .rev()
        .filter(|entry| match month {
            Some(month) => month_of(&entry.date).as_deref() == Some(month),
            None => true,
        })
        .cloned()
        .collect()
}

/// The most recently added item first, then the rest by name
pub fn manage_items(state: &InventoryState, filter: &ItemFilter) -> Vec<Item> {
    let mut items: Vec<Item> = state
        .items
        .iter()
        .filter(|item| filter.matches(item, false))
        .cloned()
        .collect();
    let Some(newest) = items.pop() else {
        return items;
    };
    items.sort_by(|a, b| a.name.cmp(&b.name));
    items.insert(0, newest);
    items
}

pub fn item_asset_keys(item: &Item) -> Vec<Option<AssetKey>> {
    vec![asset_key(item.photo.as_deref())]
}

pub fn history_asset_keys(entry: &HistoryEntry) -> Vec<Option<AssetKey>> {
    vec![
        asset_key(entry.photo.as_deref()),
        asset_key(entry.sign_photo.as_deref()),
    ]
}

fn item_header(card: &mut Card, item: &Item) -> Result<(), NodeBuildError> {
    if item.name.trim().is_empty() {
        return Err(NodeBuildError::new(format!("item {} has no name", item.id)));
    }
    card.push(format!("[{}] {}", item.status.label(), item.category));
    card.push(item.name.clone());
    if !item.desc.is_empty() {
        card.push(item.desc.clone());
    }
    Ok(())
}

pub struct DashboardCards;

impl NodeBuilder<Item> for DashboardCards {
    type Node = Card;

    fn build(&self, item: &Item, assets: &ItemAssets) -> Result<Card, NodeBuildError> {
        let mut card = Card::default();
        item_header(&mut card, item)?;

        if item.status == ItemStatus::Borrowed {
            let borrower = item.borrowed_by.as_deref().ok_or_else(|| {
                NodeBuildError::new(format!("borrowed item {} has no borrower", item.id))
            })?;
            let mut line = format!(
                "Borrowed by: {} • {}",
                borrower,
                format_date(item.borrow_date.as_deref().unwrap_or_default())
            );
            if let Some(time) = &item.borrow_time {
                line.push_str(&format!(" • {}", time));
            }
            if let Some(expected) = &item.expected_return {
                line.push_str(&format!(" • due: {}", format_date(expected)));
            }
            card.push(line);
        }

        if let Some(handle) = assets.primary().and_then(|asset| asset.handle.as_ref()) {
            card.push(format!("Photo: {}", handle));
        }
        Ok(card)
    }

    fn placeholder(&self, _item: &Item) -> Card {
        Card::default()
    }
}

pub struct HistoryCards;

impl NodeBuilder<HistoryEntry> for HistoryCards {
    type Node = Card;

    fn build(&self, entry: &HistoryEntry, assets: &ItemAssets) -> Result<Card, NodeBuildError> {
        let mut card = Card::default();
        let mut line = format!(
            "{} • {} • {} • {}",
            entry.action.to_uppercase(),
            entry.item_name,
            entry.borrower.as_deref().unwrap_or_default(),
            format_date(&entry.date)
        );
        if let Some(time) = &entry.time {
            line.push_str(&format!(" • {}", time));
        }
        card.push(line);

        if let Some(handle) = assets.get(0).and_then(|asset| asset.handle.as_ref()) {
            card.push(format!("Photo: {}", handle));
        }
        if let Some(handle) = assets.get(1).and_then(|asset| asset.handle.as_ref()) {
            card.push(format!("Signature: {}", handle));
        }
        Ok(card)
    }

    fn placeholder(&self, _entry: &HistoryEntry) -> Card {
        Card::default()
    }
}

pub struct ManageCards;

impl NodeBuilder<Item> for ManageCards {
    type Node = Card;

    fn build(&self, item: &Item, _assets: &ItemAssets) -> Result<Card, NodeBuildError> {
        let mut card = Card::default();
        item_header(&mut card, item)?;
        if item.status == ItemStatus::Available {
            card.push(format!("Actions: edit {0} | delete {0}", item.id));
        }
        Ok(card)
    }

    fn placeholder(&self, _item: &Item) -> Card {
        Card::default()
    }
}
