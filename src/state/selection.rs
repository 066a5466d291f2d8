use std::collections::BTreeSet;

use crate::state::data_model::EntityId;

/// Selected row identities, independent of the current order, filter and
/// page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<EntityId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&mut self, id: &EntityId) -> bool {
        let selected = !self.ids.contains(id);
        self.set(id, selected);
        selected
    }

    pub fn set(&mut self, id: &EntityId, selected: bool) {
        if selected {
            self.ids.insert(id.clone());
        } else {
            self.ids.remove(id);
        }
    }

    /// Selects or releases every identity of the filtered view, on every
    /// page. Identities outside the view are left as they are.
    pub fn toggle_all<'a>(&mut self, view_ids: impl IntoIterator<Item = &'a EntityId>, select: bool) {
        for id in view_ids {
            self.set(id, select);
        }
    }

    pub fn is_selected(&self, id: &EntityId) -> bool {
        self.ids.contains(id)
    }

    pub fn selected_ids(&self) -> &BTreeSet<EntityId> {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn is_all_selected(&self, view_ids: &[EntityId]) -> bool {
        !view_ids.is_empty() && view_ids.iter().all(|id| self.ids.contains(id))
    }

    pub fn is_some_selected(&self, view_ids: &[EntityId]) -> bool {
        view_ids.iter().any(|id| self.ids.contains(id)) && !self.is_all_selected(view_ids)
    }

    /// Selected identities that are part of the filtered view, in view
    /// order. Bulk actions operate on exactly this set.
    pub fn resolve(&self, view_ids: &[EntityId]) -> Vec<EntityId> {
        view_ids
            .iter()
            .filter(|id| self.ids.contains(id))
            .cloned()
            .collect()
    }

    /// Drops identities that no longer exist after a refresh.
    pub fn retain<'a>(&mut self, existing: impl IntoIterator<Item = &'a EntityId>) {
        let existing: BTreeSet<&EntityId> = existing.into_iter().collect();
        self.ids.retain(|id| existing.contains(id));
    }
}
