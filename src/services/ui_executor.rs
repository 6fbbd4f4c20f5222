//! UI action executor.
//!
//! Applies simulated-user actions to a [`UiState`]. Every action has a total
//! effect: anything that does not make sense in the current state is a
//! no-op, so the executor never fails and both state invariants hold after
//! each application.

use tracing::trace;

use crate::domain::models::{
    Action, FilterValue, UiState, View, VisibleWindow, MAX_MILEAGE, MILEAGE_FILTER_ID,
};

/// Applies actions with a fixed page size for window movement.
#[derive(Debug, Clone, Copy)]
pub struct UiExecutor {
    page_size: usize,
}

impl UiExecutor {
    pub const fn new(page_size: usize) -> Self {
        Self {
            page_size: if page_size == 0 { 1 } else { page_size },
        }
    }

    /// Apply `actions` in order to a copy of `state`.
    #[must_use]
    pub fn apply_all(&self, state: &UiState, actions: &[Action]) -> UiState {
        let mut next = state.clone();
        for action in actions {
            self.apply(&mut next, action);
        }
        next
    }

    /// Apply one action in place.
    pub fn apply(&self, state: &mut UiState, action: &Action) {
        trace!(?action, "applying ui action");
        match action {
            Action::ClickCard { index } => {
                if is_clickable(state, *index) {
                    state.selected_index = Some(*index);
                    state.detail_open = true;
                }
            }
            Action::ToggleFilter { id } => {
                if state.filters.remove(id).is_none() {
                    state.filters.insert(id.clone(), FilterValue::Enabled);
                }
            }
            Action::SetMileage { value } => {
                if !value.is_nan() {
                    let clamped = value.clamp(0.0, f64::from(MAX_MILEAGE)).round();
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let miles = clamped as u32;
                    state
                        .filters
                        .insert(MILEAGE_FILTER_ID.to_string(), FilterValue::Mileage(miles));
                }
            }
            Action::RefreshFilters => {
                state.filters.clear();
                state.view = View::Results;
                state.visible_window = self.first_page(state);
                state.clamp_selection();
            }
            Action::ShowFavorites => {
                state.view = View::Favorites;
                state.selected_index = None;
                state.detail_open = false;
            }
            Action::FavoriteCard { index } => {
                if state.visible_window.contains(*index) {
                    if let Some(card) = state.cards.get(*index) {
                        if !state.favorites.remove(&card.id) {
                            state.favorites.insert(card.id.clone());
                        }
                    }
                }
            }
            Action::CloseDetail => state.detail_open = false,
            Action::Scroll => {
                let end = state.visible_window.end();
                if end < state.cards.len() {
                    let remaining = state.cards.len() - end;
                    state.visible_window = VisibleWindow::new(end, remaining.min(self.page_size));
                    state.clamp_selection();
                }
            }
            // Stop is consumed by the controller.
            Action::Stare | Action::Stop => {}
        }
    }

    fn first_page(&self, state: &UiState) -> VisibleWindow {
        VisibleWindow::new(0, state.cards.len().min(self.page_size))
    }
}

fn is_clickable(state: &UiState, index: usize) -> bool {
    state.visible_window.contains(index) && (state.cards.is_empty() || index < state.cards.len())
}

/// Apply `actions` to `state` with the given page size.
pub fn apply_actions(state: &UiState, actions: &[Action], page_size: usize) -> UiState {
    UiExecutor::new(page_size).apply_all(state, actions)
}
