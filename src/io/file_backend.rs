//! [`Backend`] over a local JSON catalog and a blob directory.

use std::fs;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{BackendError, BackendResult};
use crate::io::backend::{Backend, Patch, QuerySpec};
use crate::io::json_io::{self, JsonIoError};
use crate::io::atomic_write;
use crate::state::data_model::{CellValue, Entity, EntityId};
use crate::state::schema::Schema;
use crate::state::view::SortOrder;

pub struct JsonFileBackend {
    catalog_path: PathBuf,
    storage_dir: PathBuf,
    public_base_url: String,
    schema: Schema,
    /// Serializes read-modify-write cycles on the catalog file.
    write_lock: Mutex<()>,
}

impl JsonFileBackend {
    /// Opens `catalog_path`, creating an empty catalog if it does not exist.
    pub fn open(
        catalog_path: impl Into<PathBuf>,
        storage_dir: impl Into<PathBuf>,
        public_base_url: &str,
        schema: Schema,
    ) -> Result<Self, JsonIoError> {
        let catalog_path = catalog_path.into();
        if !catalog_path.exists() {
            json_io::save_json(&catalog_path, &[])?;
        }
        Ok(Self {
            catalog_path,
            storage_dir: storage_dir.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            schema,
            write_lock: Mutex::new(()),
        })
    }

    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    fn blob_path(&self, path: &str) -> BackendResult<PathBuf> {
        let relative = Path::new(path);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if path.is_empty() || !safe {
            return Err(BackendError::Rejected(format!("invalid object path '{path}'")));
        }
        Ok(self.storage_dir.join(relative))
    }

    async fn read_catalog(&self) -> BackendResult<Vec<Entity>> {
        let path = self.catalog_path.clone();
        let schema = self.schema.clone();
        run_blocking(move || json_io::load_products(&path, &schema).map_err(unavailable)).await
    }

    /// Loads the catalog, applies `edit` and writes the result back. The file
    /// is left untouched when `edit` fails.
    async fn edit_catalog<T, F>(&self, edit: F) -> BackendResult<T>
    where
        F: FnOnce(&mut Vec<Entity>) -> BackendResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let _guard = self.write_lock.lock().await;
        let path = self.catalog_path.clone();
        let schema = self.schema.clone();
        run_blocking(move || {
            let mut entities = json_io::load_products(&path, &schema).map_err(unavailable)?;
            let out = edit(&mut entities)?;
            json_io::save_products(&path, &entities).map_err(unavailable)?;
            Ok(out)
        })
        .await
    }
}

#[async_trait]
impl Backend for JsonFileBackend {
    async fn query(&self, spec: &QuerySpec) -> BackendResult<Vec<Entity>> {
        let mut rows = self.read_catalog().await?;
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
        let id = id.clone();
        let column = column.to_string();
        let value = value.clone();
        self.edit_catalog(move |entities| {
            let entity = find_mut(entities, &id)?;
            entity.set(&column, value);
            Ok(())
        })
        .await
    }

    async fn mutate_batch(&self, ids: &[EntityId], patch: &Patch) -> BackendResult<()> {
        let ids = ids.to_vec();
        let patch = patch.clone();
        self.edit_catalog(move |entities| {
            for entity in entities.iter_mut().filter(|e| ids.contains(e.id())) {
                for (column, value) in &patch {
                    entity.set(column, value.clone());
                }
            }
            Ok(())
        })
        .await
    }

    async fn delete_batch(&self, ids: &[EntityId]) -> BackendResult<()> {
        let ids = ids.to_vec();
        self.edit_catalog(move |entities| {
            entities.retain(|entity| !ids.contains(entity.id()));
            Ok(())
        })
        .await
    }

    async fn upload_binary(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> BackendResult<String> {
        let target = self.blob_path(path)?;
        run_blocking(move || atomic_write(&target, &bytes).map_err(io_unavailable)).await?;
        Ok(format!("{}/{path}", self.public_base_url))
    }

    async fn link_reference(&self, id: &EntityId, field: &str, reference: &str) -> BackendResult<()> {
        self.mutate_field(id, field, &CellValue::Url(Some(reference.to_string())))
            .await
    }

    async fn remove_binary(&self, path: &str) -> BackendResult<()> {
        let target = self.blob_path(path)?;
        let path = path.to_string();
        run_blocking(move || {
            fs::remove_file(&target).map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => BackendError::NotFound(path),
                _ => io_unavailable(err),
            })
        })
        .await
    }
}

fn find_mut<'a>(entities: &'a mut [Entity], id: &EntityId) -> BackendResult<&'a mut Entity> {
    entities
        .iter_mut()
        .find(|entity| entity.id() == id)
        .ok_or_else(|| BackendError::NotFound(id.to_string()))
}

async fn run_blocking<T, F>(job: F) -> BackendResult<T>
where
    F: FnOnce() -> BackendResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|err| BackendError::Unavailable(err.to_string()))?
}

fn unavailable(err: JsonIoError) -> BackendError {
    BackendError::Unavailable(err.to_string())
}

fn io_unavailable(err: std::io::Error) -> BackendError {
    BackendError::Unavailable(err.to_string())
}
