//! Mirror of the shopping front-end's visible state, and the actions a
//! simulated user can take on it.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Upper bound accepted by the mileage slider.
pub const MAX_MILEAGE: u32 = 200_000;

/// Filter id written by [`Action::SetMileage`].
pub const MILEAGE_FILTER_ID: &str = "max_mileage";

/// Contiguous slice of the card list currently on screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleWindow {
    pub start: usize,
    pub count: usize,
}

impl VisibleWindow {
    pub const fn new(start: usize, count: usize) -> Self {
        Self { start, count }
    }

    pub const fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.start + self.count
    }

    pub const fn end(&self) -> usize {
        self.start + self.count
    }
}

/// A product card as shown by the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

/// Which list the card window is showing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    #[default]
    Results,
    Favorites,
}

/// Value held by an active filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterValue {
    Enabled,
    Mileage(u32),
}

/// Visible UI state for one simulated session.
///
/// Invariants, preserved by every action application:
/// - `selected_index`, when set, lies inside `visible_window`
/// - `detail_open` implies `selected_index` is set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiState {
    pub visible_window: VisibleWindow,
    pub selected_index: Option<usize>,
    pub filters: BTreeMap<String, FilterValue>,
    pub favorites: BTreeSet<String>,
    pub detail_open: bool,
    #[serde(default)]
    pub cards: Vec<Card>,
    #[serde(default)]
    pub view: View,
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check both structural invariants.
    pub fn invariants_hold(&self) -> bool {
        let selection_ok = self
            .selected_index
            .is_none_or(|i| self.visible_window.contains(i));
        let detail_ok = !self.detail_open || self.selected_index.is_some();
        selection_ok && detail_ok
    }

    /// Card currently selected, if the index refers to a known card.
    pub fn selected_card(&self) -> Option<&Card> {
        self.selected_index.and_then(|i| self.cards.get(i))
    }

    /// Cards inside the visible window.
    pub fn visible_cards(&self) -> &[Card] {
        let start = self.visible_window.start.min(self.cards.len());
        let end = self.visible_window.end().min(self.cards.len());
        &self.cards[start..end]
    }

    /// Drop a selection that fell outside the window, closing detail with it.
    pub(crate) fn clamp_selection(&mut self) {
        if let Some(i) = self.selected_index {
            if !self.visible_window.contains(i) {
                self.selected_index = None;
            }
        }
        if self.selected_index.is_none() {
            self.detail_open = false;
        }
    }

    /// Replace the card list with the agent's latest products.
    ///
    /// An unchanged id list keeps the current window and selection. Any
    /// change resets the window to the first page and drops the selection.
    /// An empty product list leaves the current cards in place.
    pub fn sync_cards(&mut self, cards: Vec<Card>, page_size: usize) {
        if cards.is_empty() {
            return;
        }
        let unchanged = cards.len() == self.cards.len()
            && cards.iter().zip(&self.cards).all(|(a, b)| a.id == b.id);
        if unchanged {
            self.cards = cards;
            return;
        }
        self.visible_window = VisibleWindow::new(0, cards.len().min(page_size));
        self.cards = cards;
        self.view = View::Results;
        self.selected_index = None;
        self.detail_open = false;
    }

    /// Compact JSON rendering sent as `ui_context` and used in prompts.
    pub fn context_json(&self) -> serde_json::Value {
        serde_json::json!({
            "visible_window": {
                "start": self.visible_window.start,
                "count": self.visible_window.count,
            },
            "visible_cards": self.visible_cards(),
            "selected_index": self.selected_index,
            "selected_card": self.selected_card(),
            "detail_open": self.detail_open,
            "filters": self.filters,
            "favorites": self.favorites,
            "view": self.view,
        })
    }
}

/// Something a simulated user does on screen.
///
/// Decoded leniently from the drafter's output: entries that do not match
/// a known variant are dropped before they reach the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    ClickCard { index: usize },
    ToggleFilter { id: String },
    SetMileage { value: f64 },
    RefreshFilters,
    ShowFavorites,
    FavoriteCard { index: usize },
    CloseDetail,
    Scroll,
    Stare,
    Stop,
}

impl Action {
    pub const fn is_stop(&self) -> bool {
        matches!(self, Self::Stop)
    }

    /// Wire tag of the action.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ClickCard { .. } => "click_card",
            Self::ToggleFilter { .. } => "toggle_filter",
            Self::SetMileage { .. } => "set_mileage",
            Self::RefreshFilters => "refresh_filters",
            Self::ShowFavorites => "show_favorites",
            Self::FavoriteCard { .. } => "favorite_card",
            Self::CloseDetail => "close_detail",
            Self::Scroll => "scroll",
            Self::Stare => "stare",
            Self::Stop => "stop",
        }
    }

    /// Decode one action, returning `None` for unknown or malformed entries.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}
