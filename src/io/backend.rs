//! Capability interface of the remote store.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::BackendResult;
use crate::state::data_model::{CellValue, Entity, EntityId};
use crate::state::view::SortOrder;

/// Column/value pairs applied to every row of a batch.
pub type Patch = BTreeMap<String, CellValue>;

/// Read request for one page load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuerySpec {
    pub order_by: Option<(String, SortOrder)>,
}

impl Default for QuerySpec {
    /// Newest products first.
    fn default() -> Self {
        Self {
            order_by: Some(("created_at".to_string(), SortOrder::Desc)),
        }
    }
}

/// The remote store as seen by the grid. One instance is shared by every
/// controller for the lifetime of the host application.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn query(&self, spec: &QuerySpec) -> BackendResult<Vec<Entity>>;

    /// Single-field patch of one row.
    async fn mutate_field(&self, id: &EntityId, column: &str, value: &CellValue) -> BackendResult<()>;

    /// Applies `patch` to every row in `ids` in one request.
    async fn mutate_batch(&self, ids: &[EntityId], patch: &Patch) -> BackendResult<()>;

    async fn delete_batch(&self, ids: &[EntityId]) -> BackendResult<()>;

    /// Stores `bytes` under `path` and returns its public reference.
    async fn upload_binary(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> BackendResult<String>;

    async fn link_reference(&self, id: &EntityId, field: &str, reference: &str) -> BackendResult<()>;

    /// Deletes a stored object. Used to clean up uploads that were never
    /// linked.
    async fn remove_binary(&self, path: &str) -> BackendResult<()>;
}
