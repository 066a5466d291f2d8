use std::collections::HashMap;

use crate::error::{BackendResult, GridError, Result};
use crate::state::data_model::{CellValue, EntityId};
use crate::state::row_store::RowStore;

/// Address of one editable cell.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub id: EntityId,
    pub column: String,
}

impl CellKey {
    pub fn new(id: EntityId, column: &str) -> Self {
        Self {
            id,
            column: column.to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditStatus {
    Clean,
    /// Local buffer differs from the stored value; nothing sent yet.
    Pending,
    /// A write for this cell is in flight; the cell is locked.
    Saving,
    /// The last write was rejected and the value rolled back. Editable.
    Error,
}

/// What started a commit. Blur and the confirm key share one commit path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitTrigger {
    Blur,
    Confirm,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EditBuffer {
    original: Option<CellValue>,
    pending: CellValue,
    status: EditStatus,
}

impl EditBuffer {
    pub fn original(&self) -> Option<&CellValue> {
        self.original.as_ref()
    }

    pub fn pending(&self) -> &CellValue {
        &self.pending
    }

    pub fn status(&self) -> EditStatus {
        self.status
    }

    fn is_unchanged(&self) -> bool {
        self.original.as_ref() == Some(&self.pending)
    }
}

/// The single-field write a commit sends to the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldMutation {
    pub key: CellKey,
    pub value: CellValue,
}

#[derive(Clone, Debug, PartialEq)]
pub enum CommitPlan {
    /// No buffer, or the buffer equals the stored value. Nothing to send.
    Unchanged,
    /// A write for this cell is already in flight.
    AlreadySaving,
    Send(FieldMutation),
}

/// Per-cell optimistic edit state machine:
/// clean → pending → saving → clean, or error (rolled back).
#[derive(Clone, Debug, Default)]
pub struct EditController {
    buffers: HashMap<CellKey, EditBuffer>,
}

impl EditController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self, key: &CellKey) -> Option<&EditBuffer> {
        self.buffers.get(key)
    }

    pub fn status(&self, key: &CellKey) -> EditStatus {
        self.buffers
            .get(key)
            .map(EditBuffer::status)
            .unwrap_or(EditStatus::Clean)
    }

    pub fn is_editable(&self, key: &CellKey) -> bool {
        self.status(key) != EditStatus::Saving
    }

    /// The value a cell shows: the local buffer while one exists, otherwise
    /// the stored value.
    pub fn display_value(&self, key: &CellKey, store: &RowStore) -> Option<CellValue> {
        match self.buffers.get(key) {
            Some(buffer) if buffer.status == EditStatus::Pending => Some(buffer.pending.clone()),
            _ => store.value(&key.id, &key.column).cloned(),
        }
    }

    /// Records a keystroke. Only the local buffer changes.
    pub fn input(&mut self, key: &CellKey, value: CellValue, store: &RowStore) -> Result<()> {
        if let Some(buffer) = self.buffers.get_mut(key) {
            if buffer.status == EditStatus::Saving {
                return Err(GridError::busy(format!(
                    "cell {}.{} is being saved",
                    key.id, key.column
                )));
            }
            buffer.pending = value;
            buffer.status = EditStatus::Pending;
            return Ok(());
        }

        let entity = store
            .get(&key.id)
            .ok_or_else(|| GridError::NotFound(format!("entity '{}'", key.id)))?;
        self.buffers.insert(
            key.clone(),
            EditBuffer {
                original: entity.get(&key.column).cloned(),
                pending: value,
                status: EditStatus::Pending,
            },
        );
        Ok(())
    }

    /// Moves a pending buffer to saving and pre-applies its value to the
    /// store. An unchanged buffer is dropped without a write.
    pub fn begin_commit(&mut self, key: &CellKey, store: &mut RowStore) -> Result<CommitPlan> {
        let Some(buffer) = self.buffers.get_mut(key) else {
            return Ok(CommitPlan::Unchanged);
        };

        match buffer.status {
            EditStatus::Saving => return Ok(CommitPlan::AlreadySaving),
            EditStatus::Error | EditStatus::Clean => {
                self.buffers.remove(key);
                return Ok(CommitPlan::Unchanged);
            }
            EditStatus::Pending => {}
        }

        if buffer.is_unchanged() {
            self.buffers.remove(key);
            tracing::debug!(id = %key.id, column = %key.column, "edit unchanged, skipping write");
            return Ok(CommitPlan::Unchanged);
        }

        let value = buffer.pending.clone();
        store.apply_optimistic(&key.id, &key.column, value.clone())?;
        buffer.status = EditStatus::Saving;
        tracing::debug!(id = %key.id, column = %key.column, "edit saving");
        Ok(CommitPlan::Send(FieldMutation {
            key: key.clone(),
            value,
        }))
    }

    /// Settles a write started by [`begin_commit`](Self::begin_commit).
    /// On failure the stored value reverts to the pre-edit original and the
    /// cell is left in the error state, editable again.
    pub fn finish_commit(
        &mut self,
        key: &CellKey,
        result: BackendResult<()>,
        store: &mut RowStore,
    ) -> Result<CellValue> {
        let buffer = match self.buffers.get(key) {
            Some(buffer) if buffer.status == EditStatus::Saving => buffer.clone(),
            _ => {
                return Err(GridError::NotFound(format!(
                    "no save in flight for {}.{}",
                    key.id, key.column
                )))
            }
        };

        match result {
            Ok(()) => {
                self.buffers.remove(key);
                if let Err(err) = store.acknowledge(&key.id, &key.column, buffer.pending.clone()) {
                    tracing::debug!(id = %key.id, error = %err, "acknowledged row no longer loaded");
                }
                tracing::info!(id = %key.id, column = %key.column, value = %buffer.pending, "edit saved");
                Ok(buffer.pending)
            }
            Err(err) => {
                store.rollback(&key.id, &key.column, buffer.original.clone());
                match buffer.original.clone() {
                    Some(original) => {
                        self.buffers.insert(
                            key.clone(),
                            EditBuffer {
                                original: Some(original.clone()),
                                pending: original,
                                status: EditStatus::Error,
                            },
                        );
                    }
                    None => {
                        self.buffers.remove(key);
                    }
                }
                tracing::warn!(id = %key.id, column = %key.column, error = %err, "edit rejected, rolled back");
                Err(GridError::Mutation(err))
            }
        }
    }

    /// Drops an unsaved buffer, e.g. when the cell unmounts. A buffer that
    /// is saving is kept until its write settles.
    pub fn discard(&mut self, key: &CellKey) -> bool {
        match self.buffers.get(key) {
            Some(buffer) if buffer.status != EditStatus::Saving => {
                self.buffers.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Brings buffers in line with a refreshed store. Buffers of vanished
    /// rows, and unsaved buffers whose stored value changed underneath them,
    /// are dropped so the cell shows the fresh value.
    pub fn reconcile(&mut self, store: &RowStore) {
        self.buffers.retain(|key, buffer| {
            if buffer.status == EditStatus::Saving {
                return true;
            }
            let Some(entity) = store.get(&key.id) else {
                return false;
            };
            entity.get(&key.column) == buffer.original.as_ref()
        });
    }
}
