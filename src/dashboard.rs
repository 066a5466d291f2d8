//! The product grid as one object: shared state behind a lock plus the
//! injected backend. Every multi-step flow takes the lock only for its
//! synchronous transitions, never across an `.await`, so the grid stays
//! usable while saves, bulk actions and uploads are pending.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::GridConfig;
use crate::controller::bulk::{BulkAction, BulkController, BulkOutcome};
use crate::controller::edit::{CellKey, CommitPlan, CommitTrigger, EditController, EditStatus};
use crate::controller::upload::{
    self, IncomingFile, UploadController, UploadLimits, UploadOutcome, UploadState, UploadToken,
};
use crate::error::{BackendError, GridError, Result};
use crate::io::backend::{Backend, QuerySpec};
use crate::media::crop::{CropRect, CropSession};
use crate::media::raster;
use crate::state::data_model::{CellValue, Entity, EntityId, ProductStatus};
use crate::state::notice::Notice;
use crate::state::row_store::RowStore;
use crate::state::selection::Selection;
use crate::state::view::{self, DerivedView, ViewState};

#[derive(Clone, Debug, PartialEq)]
pub enum CommitOutcome {
    /// Nothing to write: no edit, or the edit matched the stored value.
    Unchanged,
    /// The other commit trigger already started this cell's save.
    AlreadySaving,
    Saved(CellValue),
}

/// Everything the grid controllers share.
#[derive(Debug)]
pub struct GridState {
    pub rows: RowStore,
    pub view: ViewState,
    pub selection: Selection,
    pub edits: EditController,
    pub bulk: BulkController,
    pub uploads: UploadController,
    notices: Vec<Notice>,
}

impl GridState {
    pub fn new(config: &GridConfig) -> Self {
        Self {
            rows: RowStore::new(),
            view: ViewState::new(&config.filter_column, config.page_size),
            selection: Selection::new(),
            edits: EditController::new(),
            bulk: BulkController::new(),
            uploads: UploadController::new(UploadLimits {
                max_bytes: config.max_upload_bytes,
                min_zoom: config.min_zoom,
                max_zoom: config.max_zoom,
            }),
            notices: Vec::new(),
        }
    }

    pub fn derive_view(&self) -> DerivedView {
        view::derive_view(self.rows.rows(), &self.view)
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    fn apply_refresh(&mut self, rows: Vec<Entity>) -> Result<usize> {
        self.rows.replace_all(rows)?;
        self.selection.retain(self.rows.ids());
        self.edits.reconcile(&self.rows);
        Ok(self.rows.len())
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}

pub struct Dashboard<B: Backend + ?Sized> {
    backend: Arc<B>,
    config: GridConfig,
    query: QuerySpec,
    state: Mutex<GridState>,
}

impl<B: Backend + ?Sized> Dashboard<B> {
    pub fn new(backend: Arc<B>, config: GridConfig) -> Self {
        let state = GridState::new(&config);
        Self {
            backend,
            config,
            query: QuerySpec::default(),
            state: Mutex::new(state),
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Runs `f` against a consistent snapshot of the grid state.
    pub fn with_state<R>(&self, f: impl FnOnce(&GridState) -> R) -> R {
        f(&*self.state.lock())
    }

    pub fn drain_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut self.state.lock().notices)
    }

    // ---- rows -------------------------------------------------------------

    /// Reads the full row set from the backend. Used on page load and after
    /// every bulk action.
    pub async fn refresh(&self) -> Result<usize> {
        let rows = self.backend.query(&self.query).await?;
        tracing::debug!(rows = rows.len(), "rows fetched");
        self.state.lock().apply_refresh(rows)
    }

    pub fn entity(&self, id: &EntityId) -> Option<Entity> {
        self.state.lock().rows.get(id).cloned()
    }

    // ---- view -------------------------------------------------------------

    pub fn view(&self) -> DerivedView {
        self.state.lock().derive_view()
    }

    /// Entities of the current page, in display order.
    pub fn page_rows(&self) -> Vec<Entity> {
        let state = self.state.lock();
        state
            .derive_view()
            .page_ids
            .iter()
            .filter_map(|id| state.rows.get(id).cloned())
            .collect()
    }

    pub fn view_state(&self) -> ViewState {
        self.state.lock().view.clone()
    }

    pub fn toggle_sort(&self, column: &str) {
        self.state.lock().view.toggle_sort(column);
    }

    pub fn set_filter(&self, query: &str) {
        self.state.lock().view.set_filter(query);
    }

    pub fn set_page_size(&self, page_size: usize) {
        self.state.lock().view.set_page_size(page_size);
    }

    pub fn next_page(&self) {
        let mut state = self.state.lock();
        let derived = state.derive_view();
        state.view.next_page(&derived);
    }

    pub fn previous_page(&self) {
        let mut state = self.state.lock();
        let derived = state.derive_view();
        state.view.previous_page(&derived);
    }

    pub fn go_to_page(&self, page_index: usize) {
        let mut state = self.state.lock();
        let derived = state.derive_view();
        state.view.go_to_page(page_index, &derived);
    }

    // ---- selection --------------------------------------------------------

    pub fn toggle_row(&self, id: &EntityId) -> bool {
        self.state.lock().selection.toggle(id)
    }

    /// Selects or releases every row of the filtered view, across pages.
    pub fn toggle_all(&self, select: bool) {
        let mut state = self.state.lock();
        let derived = state.derive_view();
        state.selection.toggle_all(&derived.filtered_ids, select);
    }

    pub fn clear_selection(&self) {
        self.state.lock().selection.clear();
    }

    pub fn is_selected(&self, id: &EntityId) -> bool {
        self.state.lock().selection.is_selected(id)
    }

    pub fn selected_ids(&self) -> BTreeSet<EntityId> {
        self.state.lock().selection.selected_ids().clone()
    }

    /// The identities a bulk action would act on.
    pub fn resolved_selection(&self) -> Vec<EntityId> {
        let state = self.state.lock();
        let derived = state.derive_view();
        state.selection.resolve(&derived.filtered_ids)
    }

    /// Whether the bulk action bar has anything to act on.
    pub fn bulk_bar_visible(&self) -> bool {
        !self.resolved_selection().is_empty()
    }

    // ---- inline edits -----------------------------------------------------

    /// Feeds raw input into a cell's local buffer. Numeric input is coerced
    /// here, so the buffer is always well-typed. No request is made.
    pub fn edit_input(&self, id: &EntityId, column: &str, raw: &str) -> Result<()> {
        if !self.config.is_editable(column) {
            return Err(GridError::validation(format!("column '{column}' is read-only")));
        }
        let value = self.config.columns.coerce_input(column, raw)?;
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state
            .edits
            .input(&CellKey::new(id.clone(), column), value, &state.rows)
    }

    /// Commits a cell on blur or confirm. Both triggers share this path, so
    /// the second of the two is a no-op while the first is saving.
    pub async fn commit_cell(
        &self,
        id: &EntityId,
        column: &str,
        trigger: CommitTrigger,
    ) -> Result<CommitOutcome> {
        let key = CellKey::new(id.clone(), column);
        let plan = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            state.edits.begin_commit(&key, &mut state.rows)?
        };

        let mutation = match plan {
            CommitPlan::Unchanged => return Ok(CommitOutcome::Unchanged),
            CommitPlan::AlreadySaving => {
                tracing::debug!(id = %id, column, ?trigger, "commit already in flight");
                return Ok(CommitOutcome::AlreadySaving);
            }
            CommitPlan::Send(mutation) => mutation,
        };

        let result = self
            .backend
            .mutate_field(&mutation.key.id, &mutation.key.column, &mutation.value)
            .await;

        let mut guard = self.state.lock();
        let state = &mut *guard;
        match state.edits.finish_commit(&key, result, &mut state.rows) {
            Ok(value) => {
                state.notify(Notice::success(updated_key(column)));
                Ok(CommitOutcome::Saved(value))
            }
            Err(err) => {
                state.notify(Notice::error("notice.update_failed", &err));
                Err(err)
            }
        }
    }

    /// Drops an unsaved edit, e.g. when its cell unmounts.
    pub fn discard_edit(&self, id: &EntityId, column: &str) -> bool {
        self.state
            .lock()
            .edits
            .discard(&CellKey::new(id.clone(), column))
    }

    /// The value a cell currently shows.
    pub fn cell_value(&self, id: &EntityId, column: &str) -> Option<CellValue> {
        let state = self.state.lock();
        state
            .edits
            .display_value(&CellKey::new(id.clone(), column), &state.rows)
    }

    pub fn cell_status(&self, id: &EntityId, column: &str) -> EditStatus {
        self.state
            .lock()
            .edits
            .status(&CellKey::new(id.clone(), column))
    }

    pub fn is_cell_editable(&self, id: &EntityId, column: &str) -> bool {
        self.config.is_editable(column)
            && self
                .state
                .lock()
                .edits
                .is_editable(&CellKey::new(id.clone(), column))
    }

    // ---- bulk actions -----------------------------------------------------

    pub async fn bulk_delete(&self) -> Result<BulkOutcome> {
        self.run_bulk(BulkAction::Delete).await
    }

    pub async fn bulk_set_status(&self, status: ProductStatus) -> Result<BulkOutcome> {
        self.run_bulk(BulkAction::SetStatus(status)).await
    }

    pub fn bulk_busy(&self) -> bool {
        self.state.lock().bulk.is_busy()
    }

    async fn run_bulk(&self, action: BulkAction) -> Result<BulkOutcome> {
        let request = {
            let mut state = self.state.lock();
            let derived = state.derive_view();
            let ids = state.selection.resolve(&derived.filtered_ids);
            state.bulk.begin(action, ids)?
        };
        let Some(request) = request else {
            return Ok(BulkOutcome::NoOp);
        };

        let result = match action.patch() {
            None => self.backend.delete_batch(&request.ids).await,
            Some(patch) => self.backend.mutate_batch(&request.ids, &patch).await,
        };
        let count = request.ids.len();

        match result {
            Ok(()) => {
                let refreshed = self.backend.query(&self.query).await;
                let mut state = self.state.lock();
                state.bulk.finish();
                state.selection.clear();
                state.notify(Notice::success(action.success_key()).with_count(count));
                tracing::info!(?action, count, "bulk action applied");
                // The mutation stands even when the reload does not.
                let reloaded = refreshed
                    .map_err(GridError::from)
                    .and_then(|rows| state.apply_refresh(rows));
                if let Err(err) = reloaded {
                    tracing::warn!(?action, error = %err, "refetch after bulk action failed");
                    state.notify(Notice::error("notice.refresh_failed", &err));
                }
                Ok(BulkOutcome::Applied { action, count })
            }
            Err(BackendError::PartiallyApplied(detail)) => {
                let refreshed = self.backend.query(&self.query).await;
                let mut state = self.state.lock();
                state.bulk.finish();
                match refreshed {
                    Ok(rows) => {
                        state.apply_refresh(rows)?;
                    }
                    Err(err) => {
                        tracing::warn!(?action, error = %err, "refetch after partial bulk action failed");
                    }
                }
                state.notify(Notice::error("notice.bulk_partial", &detail));
                tracing::warn!(?action, count, %detail, "bulk action partially applied");
                Err(GridError::Consistency(detail))
            }
            Err(err) => {
                let mut state = self.state.lock();
                state.bulk.finish();
                state.notify(Notice::error(action.failure_key(), &err));
                tracing::warn!(?action, count, error = %err, "bulk action rejected");
                Err(err.into())
            }
        }
    }

    // ---- image upload -----------------------------------------------------

    pub fn open_upload(&self, id: &EntityId) -> Result<UploadToken> {
        let mut state = self.state.lock();
        if !state.rows.contains(id) {
            return Err(GridError::NotFound(format!("entity '{id}'")));
        }
        state.uploads.open(id)
    }

    pub fn upload_state(&self, id: &EntityId) -> UploadState {
        self.state.lock().uploads.state(id)
    }

    pub fn accept_file(&self, token: &UploadToken, file: IncomingFile) -> Result<()> {
        let mut state = self.state.lock();
        let result = state.uploads.accept_file(token, file);
        if let Err(GridError::Validation(detail)) = &result {
            let notice = Notice::error("notice.file_rejected", detail);
            state.notify(notice);
        }
        result
    }

    /// Decodes the accepted file off the interaction thread and enters
    /// cropping with the largest centered square.
    pub async fn start_cropping(&self, token: &UploadToken) -> Result<CropRect> {
        let source = self.state.lock().uploads.source(token)?;
        let decoded = tokio::task::spawn_blocking(move || raster::decode(&source))
            .await
            .map_err(|err| GridError::Encode(err.to_string()))
            .and_then(|decoded| decoded);

        let mut state = self.state.lock();
        match decoded {
            Ok(image) => state.uploads.install_crop(token, image),
            Err(err) => {
                let _ = state.uploads.back(token);
                state.notify(Notice::error("notice.file_rejected", &err));
                Err(err)
            }
        }
    }

    pub fn crop_rect(&self, token: &UploadToken) -> Option<CropRect> {
        self.state.lock().uploads.crop(token).map(CropSession::rect)
    }

    pub fn set_crop_rect(&self, token: &UploadToken, rect: CropRect) -> Result<CropRect> {
        self.state.lock().uploads.crop_mut(token)?.set_rect(rect)
    }

    pub fn set_zoom(&self, token: &UploadToken, zoom: f32) -> Result<CropRect> {
        self.state.lock().uploads.crop_mut(token)?.set_zoom(zoom)
    }

    pub fn pan_crop(&self, token: &UploadToken, dx: i64, dy: i64) -> Result<CropRect> {
        Ok(self.state.lock().uploads.crop_mut(token)?.pan(dx, dy))
    }

    /// Returns to file selection, dropping the current file.
    pub fn back_to_file(&self, token: &UploadToken) -> Result<()> {
        self.state.lock().uploads.back(token)
    }

    pub fn cancel_upload(&self, token: &UploadToken) -> bool {
        self.state.lock().uploads.cancel(token)
    }

    /// Rasterizes the crop, uploads it, then links it to the entity. The
    /// link is skipped when the upload fails or the session was cancelled
    /// in the meantime. A cancel that lands while the link is in flight
    /// restores the previous reference.
    pub async fn upload(&self, token: &UploadToken) -> Result<UploadOutcome> {
        let field = self.config.image_field.as_str();
        let (job, previous) = {
            let mut state = self.state.lock();
            let job = state.uploads.begin_upload(token)?;
            (job, state.rows.value(token.id(), field).cloned())
        };
        let quality = self.config.jpeg_quality;
        let encoded = tokio::task::spawn_blocking(move || raster::rasterize(&job.image, job.rect, quality))
            .await
            .map_err(|err| GridError::Encode(err.to_string()))
            .and_then(|encoded| encoded);
        let encoded = match encoded {
            Ok(encoded) => encoded,
            Err(err) => return Err(self.fail_upload(token, err)),
        };

        let path = upload::object_path(&self.config.storage_prefix, token.id());
        let reference = match self
            .backend
            .upload_binary(&path, encoded.bytes, encoded.content_type)
            .await
        {
            Ok(reference) => reference,
            Err(err) => return Err(self.fail_upload(token, err.into())),
        };

        let still_active = self.state.lock().uploads.is_uploading(token);
        if !still_active {
            return Ok(self.abandon_upload(token, &path, None).await);
        }

        if let Err(err) = self
            .backend
            .link_reference(token.id(), field, &reference)
            .await
        {
            self.discard_object(&path).await;
            return Err(self.fail_upload(token, err.into()));
        }

        {
            let mut state = self.state.lock();
            if state.uploads.is_uploading(token) {
                if let Err(err) = state.rows.acknowledge(
                    token.id(),
                    field,
                    CellValue::Url(Some(reference.clone())),
                ) {
                    tracing::debug!(id = %token.id(), error = %err, "linked row no longer loaded");
                }
                state.uploads.complete(token);
                state.notify(Notice::success("notice.photo_updated"));
                tracing::info!(id = %token.id(), %reference, "image linked");
                return Ok(UploadOutcome::Linked { reference });
            }
        }

        let restore = previous.unwrap_or(CellValue::Url(None));
        Ok(self.abandon_upload(token, &path, Some(restore)).await)
    }

    fn fail_upload(&self, token: &UploadToken, err: GridError) -> GridError {
        let mut state = self.state.lock();
        state.uploads.release(token);
        state.notify(Notice::error("notice.upload_failed", &err));
        tracing::warn!(id = %token.id(), error = %err, "upload failed");
        err
    }

    /// Settles a cancelled upload. `restore` is the reference to put back
    /// when the new one was already linked.
    async fn abandon_upload(
        &self,
        token: &UploadToken,
        path: &str,
        restore: Option<CellValue>,
    ) -> UploadOutcome {
        if let Some(previous) = restore {
            let field = self.config.image_field.as_str();
            if let Err(err) = self.backend.mutate_field(token.id(), field, &previous).await {
                tracing::warn!(id = %token.id(), error = %err, "failed to restore previous image");
            }
        }
        tracing::info!(id = %token.id(), %path, "upload abandoned, discarding object");
        self.discard_object(path).await;
        self.state.lock().uploads.release(token);
        UploadOutcome::Abandoned
    }

    async fn discard_object(&self, path: &str) {
        if let Err(err) = self.backend.remove_binary(path).await {
            tracing::warn!(%path, error = %err, "failed to remove unlinked object");
        }
    }
}

fn updated_key(column: &str) -> &'static str {
    match column {
        "price" => "notice.price_updated",
        "stock" => "notice.stock_updated",
        _ => "notice.cell_updated",
    }
}
