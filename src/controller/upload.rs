use std::collections::HashMap;
use std::sync::Arc;

use image::DynamicImage;

use crate::error::{GridError, Result};
use crate::media::crop::{CropRect, CropSession};
use crate::media::raster::{self, OUTPUT_EXTENSION};
use crate::state::data_model::EntityId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    FileAccepted,
    Cropping,
    Uploading,
    Linked,
}

/// Handle to one upload session. Stale once the session is cancelled or
/// replaced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadToken {
    id: EntityId,
    generation: u64,
}

impl UploadToken {
    pub fn id(&self) -> &EntityId {
        &self.id
    }
}

/// A file offered to the uploader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl IncomingFile {
    pub fn new(name: &str, content_type: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            content_type: content_type.to_string(),
            bytes,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum UploadOutcome {
    Linked { reference: String },
    /// The session was cancelled while its upload was in flight; nothing
    /// was linked.
    Abandoned,
}

/// Everything the off-thread rasterizer needs.
#[derive(Clone, Debug)]
pub struct UploadJob {
    pub image: Arc<DynamicImage>,
    pub rect: CropRect,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UploadLimits {
    pub max_bytes: usize,
    pub min_zoom: f32,
    pub max_zoom: f32,
}

#[derive(Debug)]
struct Slot {
    generation: u64,
    state: UploadState,
    file: Option<Arc<Vec<u8>>>,
    crop: Option<CropSession>,
    /// Cancelled while uploading. The slot stays until the upload settles so
    /// the entity cannot be reopened under it.
    abandoned: bool,
}

/// Crop/upload sessions, at most one active per entity.
#[derive(Debug)]
pub struct UploadController {
    limits: UploadLimits,
    slots: HashMap<EntityId, Slot>,
    next_generation: u64,
}

impl UploadController {
    pub fn new(limits: UploadLimits) -> Self {
        Self {
            limits,
            slots: HashMap::new(),
            next_generation: 1,
        }
    }

    pub fn state(&self, id: &EntityId) -> UploadState {
        self.slots
            .get(id)
            .map(|slot| slot.state)
            .unwrap_or(UploadState::Idle)
    }

    pub fn crop(&self, token: &UploadToken) -> Option<&CropSession> {
        self.active(token).and_then(|slot| slot.crop.as_ref())
    }

    /// Opens a session for `id`, replacing any idle or cropping one. Refused
    /// while an upload for the same entity is in flight.
    pub fn open(&mut self, id: &EntityId) -> Result<UploadToken> {
        if self.state(id) == UploadState::Uploading {
            return Err(GridError::busy(format!("an image for '{id}' is uploading")));
        }
        let generation = self.next_generation;
        self.next_generation += 1;
        self.slots.insert(
            id.clone(),
            Slot {
                generation,
                state: UploadState::Idle,
                file: None,
                crop: None,
                abandoned: false,
            },
        );
        Ok(UploadToken {
            id: id.clone(),
            generation,
        })
    }

    /// Takes the one file of a session. Anything that is not an image is
    /// refused here, before cropping starts.
    pub fn accept_file(&mut self, token: &UploadToken, file: IncomingFile) -> Result<()> {
        let max_bytes = self.limits.max_bytes;
        let slot = self.active_mut(token)?;
        if slot.state != UploadState::Idle {
            return Err(GridError::validation("session already holds a file"));
        }
        if !file.content_type.trim().to_ascii_lowercase().starts_with("image/") {
            return Err(GridError::validation(format!(
                "'{}' is {}, not an image",
                file.name, file.content_type
            )));
        }
        if file.bytes.len() > max_bytes {
            return Err(GridError::validation(format!(
                "'{}' is {} bytes, limit is {max_bytes}",
                file.name,
                file.bytes.len()
            )));
        }
        raster::sniff(&file.bytes)?;

        slot.file = Some(Arc::new(file.bytes));
        slot.state = UploadState::FileAccepted;
        tracing::debug!(id = %token.id, file = %file.name, "upload file accepted");
        Ok(())
    }

    pub(crate) fn source(&self, token: &UploadToken) -> Result<Arc<Vec<u8>>> {
        let slot = self.active(token).ok_or_else(stale)?;
        match (&slot.file, slot.state) {
            (Some(file), UploadState::FileAccepted) => Ok(file.clone()),
            _ => Err(GridError::validation("no file waiting to be cropped")),
        }
    }

    /// Installs the decoded source and enters cropping.
    pub(crate) fn install_crop(&mut self, token: &UploadToken, image: DynamicImage) -> Result<CropRect> {
        let limits = self.limits;
        let slot = self.active_mut(token)?;
        if slot.file.is_none() {
            return Err(GridError::validation("no file waiting to be cropped"));
        }
        let crop = CropSession::new(image, limits.min_zoom, limits.max_zoom)?;
        let rect = crop.rect();
        slot.crop = Some(crop);
        slot.state = UploadState::Cropping;
        Ok(rect)
    }

    /// Drops the file and returns the session to idle so another file can be
    /// offered.
    pub fn back(&mut self, token: &UploadToken) -> Result<()> {
        let slot = self.active_mut(token)?;
        if slot.state == UploadState::Uploading {
            return Err(GridError::busy("upload in progress"));
        }
        slot.file = None;
        slot.crop = None;
        slot.state = UploadState::Idle;
        Ok(())
    }

    pub fn crop_mut(&mut self, token: &UploadToken) -> Result<&mut CropSession> {
        let slot = self.active_mut(token)?;
        match (slot.state, slot.crop.as_mut()) {
            (UploadState::Cropping, Some(crop)) => Ok(crop),
            _ => Err(GridError::validation("session is not cropping")),
        }
    }

    pub(crate) fn begin_upload(&mut self, token: &UploadToken) -> Result<UploadJob> {
        let slot = self.active_mut(token)?;
        let job = match (slot.state, slot.crop.as_ref()) {
            (UploadState::Cropping, Some(crop)) => UploadJob {
                image: crop.image(),
                rect: crop.rect(),
            },
            _ => return Err(GridError::validation("session is not cropping")),
        };
        slot.state = UploadState::Uploading;
        Ok(job)
    }

    /// True while `token` names the live session and its upload is in
    /// flight and not cancelled. Checked before and after linking.
    pub fn is_uploading(&self, token: &UploadToken) -> bool {
        self.active(token)
            .is_some_and(|slot| slot.state == UploadState::Uploading && !slot.abandoned)
    }

    pub(crate) fn complete(&mut self, token: &UploadToken) {
        if let Ok(slot) = self.active_mut(token) {
            slot.state = UploadState::Linked;
            slot.file = None;
            slot.crop = None;
        }
    }

    /// Ends a failed or abandoned upload; the entity goes back to idle.
    pub(crate) fn release(&mut self, token: &UploadToken) {
        if self.active(token).is_some() {
            self.slots.remove(&token.id);
        }
    }

    /// Abandons the session. An upload still in flight keeps the entity busy
    /// until it settles, then finishes without a link. Returns false for a
    /// stale token or a session that was already abandoned.
    pub fn cancel(&mut self, token: &UploadToken) -> bool {
        let Ok(slot) = self.active_mut(token) else {
            return false;
        };
        if slot.state == UploadState::Uploading {
            if slot.abandoned {
                return false;
            }
            slot.abandoned = true;
            slot.file = None;
            slot.crop = None;
        } else {
            self.slots.remove(&token.id);
        }
        tracing::debug!(id = %token.id, "upload session cancelled");
        true
    }

    fn active(&self, token: &UploadToken) -> Option<&Slot> {
        self.slots
            .get(&token.id)
            .filter(|slot| slot.generation == token.generation)
    }

    fn active_mut(&mut self, token: &UploadToken) -> Result<&mut Slot> {
        self.slots
            .get_mut(&token.id)
            .filter(|slot| slot.generation == token.generation)
            .ok_or_else(stale)
    }
}

/// Storage path of a new product image: `{prefix}/{id}/{random}.jpg`.
pub fn object_path(prefix: &str, id: &EntityId) -> String {
    format!(
        "{}/{id}/{}.{OUTPUT_EXTENSION}",
        prefix.trim_matches('/'),
        uuid::Uuid::new_v4()
    )
}

fn stale() -> GridError {
    GridError::NotFound("upload session is no longer active".to_string())
}
