use std::collections::{HashMap, VecDeque};

use crate::error::{GridError, Result};
use crate::state::data_model::{CellValue, Entity, EntityId};

const HISTORY_LIMIT: usize = 256;

#[derive(Clone, Debug, PartialEq)]
pub enum MutationRecord {
    /// An acknowledged single-field write.
    Field {
        id: EntityId,
        column: String,
        before: Option<CellValue>,
        after: CellValue,
    },
    /// An optimistic value reverted after the store rejected it.
    Rollback {
        id: EntityId,
        column: String,
        restored: Option<CellValue>,
    },
    /// The whole row set was re-read from the backend.
    Refresh { rows: usize },
}

/// The current page's entity set. Sole owner of authoritative values.
#[derive(Clone, Debug, Default)]
pub struct RowStore {
    rows: Vec<Entity>,
    index: HashMap<EntityId, usize>,
    history: VecDeque<MutationRecord>,
}

impl RowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entities(rows: Vec<Entity>) -> Result<Self> {
        let mut store = Self::new();
        store.replace_all(rows)?;
        Ok(store)
    }

    pub fn rows(&self) -> &[Entity] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.index.get(id).and_then(|idx| self.rows.get(*idx))
    }

    pub fn value(&self, id: &EntityId, column: &str) -> Option<&CellValue> {
        self.get(id).and_then(|entity| entity.get(column))
    }

    pub fn ids(&self) -> impl Iterator<Item = &EntityId> {
        self.rows.iter().map(Entity::id)
    }

    pub fn history(&self) -> impl Iterator<Item = &MutationRecord> {
        self.history.iter()
    }

    /// Replaces the row set with a fresh read. Cells with an in-flight
    /// optimistic edit keep their optimistic value until that edit settles.
    pub fn replace_all(&mut self, rows: Vec<Entity>) -> Result<()> {
        let mut index = HashMap::with_capacity(rows.len());
        for (idx, entity) in rows.iter().enumerate() {
            if index.insert(entity.id().clone(), idx).is_some() {
                return Err(GridError::validation(format!(
                    "duplicate identity '{}'",
                    entity.id()
                )));
            }
        }

        let mut rows = rows;
        for entity in &mut rows {
            let Some(previous) = self.get(entity.id()) else {
                continue;
            };
            for column in previous.dirty_columns() {
                if let Some(value) = previous.get(column) {
                    entity.set(column, value.clone());
                }
                entity.mark_dirty(column);
            }
        }

        self.rows = rows;
        self.index = index;
        self.record(MutationRecord::Refresh {
            rows: self.rows.len(),
        });
        tracing::debug!(rows = self.rows.len(), "row store replaced");
        Ok(())
    }

    /// Pre-applies an edit before acknowledgement. Returns the value it
    /// replaced so a failed commit can restore it.
    pub fn apply_optimistic(
        &mut self,
        id: &EntityId,
        column: &str,
        value: CellValue,
    ) -> Result<Option<CellValue>> {
        let entity = self.entity_mut(id)?;
        let previous = entity.set(column, value);
        entity.mark_dirty(column);
        Ok(previous)
    }

    /// Applies a value the backend acknowledged and settles any optimistic
    /// edit of that cell.
    pub fn acknowledge(&mut self, id: &EntityId, column: &str, value: CellValue) -> Result<()> {
        let before = {
            let entity = self.entity_mut(id)?;
            entity.clear_dirty(column);
            entity.set(column, value.clone())
        };
        self.record(MutationRecord::Field {
            id: id.clone(),
            column: column.to_string(),
            before,
            after: value,
        });
        Ok(())
    }

    /// Reverts an optimistic edit. A row removed in the meantime is ignored.
    pub fn rollback(&mut self, id: &EntityId, column: &str, restored: Option<CellValue>) {
        let Ok(entity) = self.entity_mut(id) else {
            return;
        };
        entity.clear_dirty(column);
        match restored.clone() {
            Some(value) => {
                entity.set(column, value);
            }
            None => {
                entity.remove(column);
            }
        }
        self.record(MutationRecord::Rollback {
            id: id.clone(),
            column: column.to_string(),
            restored,
        });
    }

    fn entity_mut(&mut self, id: &EntityId) -> Result<&mut Entity> {
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| GridError::NotFound(format!("entity '{id}'")))?;
        Ok(&mut self.rows[idx])
    }

    fn record(&mut self, record: MutationRecord) {
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(record);
    }
}
