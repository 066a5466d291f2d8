//! In-process [`Backend`] with fault injection, write gating and a call log.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::error::{BackendError, BackendResult};
use crate::io::backend::{Backend, Patch, QuerySpec};
use crate::state::data_model::{CellValue, Entity, EntityId};
use crate::state::view::SortOrder;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Query,
    MutateField,
    MutateBatch,
    DeleteBatch,
    UploadBinary,
    LinkReference,
    RemoveBinary,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BackendCall {
    Query,
    MutateField {
        id: EntityId,
        column: String,
        value: CellValue,
    },
    MutateBatch {
        ids: Vec<EntityId>,
        patch: Patch,
    },
    DeleteBatch {
        ids: Vec<EntityId>,
    },
    UploadBinary {
        path: String,
        len: usize,
        content_type: String,
    },
    LinkReference {
        id: EntityId,
        field: String,
        reference: String,
    },
    RemoveBinary {
        path: String,
    },
}

impl BackendCall {
    pub fn operation(&self) -> Operation {
        match self {
            Self::Query => Operation::Query,
            Self::MutateField { .. } => Operation::MutateField,
            Self::MutateBatch { .. } => Operation::MutateBatch,
            Self::DeleteBatch { .. } => Operation::DeleteBatch,
            Self::UploadBinary { .. } => Operation::UploadBinary,
            Self::LinkReference { .. } => Operation::LinkReference,
            Self::RemoveBinary { .. } => Operation::RemoveBinary,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Default)]
pub struct MemoryBackend {
    public_base_url: String,
    entities: Mutex<Vec<Entity>>,
    blobs: Mutex<BTreeMap<String, StoredBlob>>,
    calls: Mutex<Vec<BackendCall>>,
    failures: Mutex<HashMap<Operation, VecDeque<BackendError>>>,
    gates: Mutex<HashMap<Operation, Arc<Semaphore>>>,
}

impl MemoryBackend {
    pub fn new(entities: Vec<Entity>) -> Self {
        Self {
            public_base_url: "memory://storage".to_string(),
            entities: Mutex::new(entities),
            ..Self::default()
        }
    }

    /// Makes the next call of `operation` fail with `error`. Calls queue up
    /// in order.
    pub fn fail_next(&self, operation: Operation, error: BackendError) {
        self.failures
            .lock()
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Holds every call of `operation` until a permit is added to the
    /// returned semaphore; each permit releases exactly one call.
    pub fn hold(&self, operation: Operation) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.gates.lock().insert(operation, gate.clone());
        gate
    }

    pub fn release(&self, operation: Operation) {
        if let Some(gate) = self.gates.lock().remove(&operation) {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    pub fn entity(&self, id: &EntityId) -> Option<Entity> {
        self.entities
            .lock()
            .iter()
            .find(|entity| entity.id() == id)
            .cloned()
    }

    pub fn entities(&self) -> Vec<Entity> {
        self.entities.lock().clone()
    }

    pub fn blob(&self, path: &str) -> Option<StoredBlob> {
        self.blobs.lock().get(path).cloned()
    }

    pub fn blob_paths(&self) -> Vec<String> {
        self.blobs.lock().keys().cloned().collect()
    }

    /// Logs the call, waits at the gate if one is set, then reports any
    /// injected failure.
    async fn enter(&self, call: BackendCall) -> BackendResult<()> {
        let operation = call.operation();
        self.calls.lock().push(call);

        let gate = self.gates.lock().get(&operation).cloned();
        if let Some(gate) = gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| BackendError::Unavailable("gate closed".to_string()))?;
            permit.forget();
        }

        match self
            .failures
            .lock()
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn query(&self, spec: &QuerySpec) -> BackendResult<Vec<Entity>> {
        self.enter(BackendCall::Query).await?;
        let mut rows = self.entities.lock().clone();
        if let Some((column, order)) = spec.order_by.as_ref() {
            rows.sort_by(|a, b| {
                let ordering = a.display(column).cmp(&b.display(column));
                match order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            });
        }
        Ok(rows)
    }

    async fn mutate_field(&self, id: &EntityId, column: &str, value: &CellValue) -> BackendResult<()> {
        self.enter(BackendCall::MutateField {
            id: id.clone(),
            column: column.to_string(),
            value: value.clone(),
        })
        .await?;

        let mut entities = self.entities.lock();
        let entity = entities
            .iter_mut()
            .find(|entity| entity.id() == id)
            .ok_or_else(|| BackendError::NotFound(id.to_string()))?;
        entity.set(column, value.clone());
        Ok(())
    }

    async fn mutate_batch(&self, ids: &[EntityId], patch: &Patch) -> BackendResult<()> {
        let result = self
            .enter(BackendCall::MutateBatch {
                ids: ids.to_vec(),
                patch: patch.clone(),
            })
            .await;

        let applied: &[EntityId] = match &result {
            Ok(()) => ids,
            Err(BackendError::PartiallyApplied(_)) => &ids[..ids.len().min(1)],
            Err(_) => &[],
        };
        let mut entities = self.entities.lock();
        for entity in entities.iter_mut().filter(|e| applied.contains(e.id())) {
            for (column, value) in patch {
                entity.set(column, value.clone());
            }
        }
        result
    }

    async fn delete_batch(&self, ids: &[EntityId]) -> BackendResult<()> {
        let result = self
            .enter(BackendCall::DeleteBatch { ids: ids.to_vec() })
            .await;

        let applied: &[EntityId] = match &result {
            Ok(()) => ids,
            Err(BackendError::PartiallyApplied(_)) => &ids[..ids.len().min(1)],
            Err(_) => &[],
        };
        self.entities
            .lock()
            .retain(|entity| !applied.contains(entity.id()));
        result
    }

    async fn upload_binary(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> BackendResult<String> {
        self.enter(BackendCall::UploadBinary {
            path: path.to_string(),
            len: bytes.len(),
            content_type: content_type.to_string(),
        })
        .await?;

        self.blobs.lock().insert(
            path.to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(format!("{}/{path}", self.public_base_url))
    }

    async fn link_reference(&self, id: &EntityId, field: &str, reference: &str) -> BackendResult<()> {
        self.enter(BackendCall::LinkReference {
            id: id.clone(),
            field: field.to_string(),
            reference: reference.to_string(),
        })
        .await?;

        let mut entities = self.entities.lock();
        let entity = entities
            .iter_mut()
            .find(|entity| entity.id() == id)
            .ok_or_else(|| BackendError::NotFound(id.to_string()))?;
        entity.set(field, CellValue::Url(Some(reference.to_string())));
        Ok(())
    }

    async fn remove_binary(&self, path: &str) -> BackendResult<()> {
        self.enter(BackendCall::RemoveBinary {
            path: path.to_string(),
        })
        .await?;

        self.blobs
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(path.to_string()))
    }
}
