use crate::error::{GridError, Result};
use crate::io::backend::Patch;
use crate::state::data_model::{CellValue, EntityId, ProductStatus};

pub const STATUS_COLUMN: &str = "status";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BulkAction {
    Delete,
    SetStatus(ProductStatus),
}

impl BulkAction {
    pub fn patch(self) -> Option<Patch> {
        match self {
            Self::Delete => None,
            Self::SetStatus(status) => Some(Patch::from([(
                STATUS_COLUMN.to_string(),
                CellValue::Status(status),
            )])),
        }
    }

    pub(crate) fn success_key(self) -> &'static str {
        match self {
            Self::Delete => "notice.bulk_deleted",
            Self::SetStatus(_) => "notice.bulk_status_updated",
        }
    }

    pub(crate) fn failure_key(self) -> &'static str {
        match self {
            Self::Delete => "notice.bulk_delete_failed",
            Self::SetStatus(_) => "notice.bulk_status_failed",
        }
    }
}

/// One batched write over a resolved selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BulkRequest {
    pub action: BulkAction,
    pub ids: Vec<EntityId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BulkOutcome {
    /// Nothing was selected; no request was made.
    NoOp,
    Applied { action: BulkAction, count: usize },
}

/// Serializes bulk actions: at most one is in flight at a time.
#[derive(Clone, Debug, Default)]
pub struct BulkController {
    busy: Option<BulkAction>,
}

impl BulkController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_some()
    }

    /// Claims the controller for `action` over `ids`. An empty id set yields
    /// no request and leaves the controller idle.
    pub fn begin(&mut self, action: BulkAction, ids: Vec<EntityId>) -> Result<Option<BulkRequest>> {
        if ids.is_empty() {
            return Ok(None);
        }
        if let Some(current) = self.busy {
            return Err(GridError::busy(format!("bulk action {current:?} in progress")));
        }
        self.busy = Some(action);
        tracing::debug!(?action, count = ids.len(), "bulk action started");
        Ok(Some(BulkRequest { action, ids }))
    }

    pub fn finish(&mut self) {
        self.busy = None;
    }
}
