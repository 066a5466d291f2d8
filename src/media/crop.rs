use std::sync::Arc;

use image::{DynamicImage, GenericImageView};

use crate::error::{GridError, Result};

/// A rectangle in source-image pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// In-progress crop of one decoded source image.
#[derive(Clone, Debug)]
pub struct CropSession {
    image: Arc<DynamicImage>,
    rect: CropRect,
    zoom: f32,
    min_zoom: f32,
    max_zoom: f32,
}

impl CropSession {
    /// Starts with the largest square centered in the source.
    pub fn new(image: DynamicImage, min_zoom: f32, max_zoom: f32) -> Result<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(GridError::validation("image has no pixels"));
        }
        let side = width.min(height);
        Ok(Self {
            image: Arc::new(image),
            rect: CropRect::new((width - side) / 2, (height - side) / 2, side, side),
            zoom: min_zoom,
            min_zoom,
            max_zoom: max_zoom.max(min_zoom),
        })
    }

    pub fn image(&self) -> Arc<DynamicImage> {
        self.image.clone()
    }

    pub fn source_size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn rect(&self) -> CropRect {
        self.rect
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Sets the crop rectangle. The shorter side wins so the rectangle stays
    /// square, and the result is shifted and shrunk to fit the source.
    pub fn set_rect(&mut self, rect: CropRect) -> Result<CropRect> {
        let (width, height) = self.source_size();
        if rect.width == 0 || rect.height == 0 {
            return Err(GridError::validation("crop rectangle is empty"));
        }
        if rect.x >= width || rect.y >= height {
            return Err(GridError::validation(format!(
                "crop origin ({}, {}) lies outside the {width}x{height} source",
                rect.x, rect.y
            )));
        }

        let side = rect.width.min(rect.height).min(width.min(height));
        self.rect = CropRect::new(
            rect.x.min(width - side),
            rect.y.min(height - side),
            side,
            side,
        );
        Ok(self.rect)
    }

    /// Zooms the preview, shrinking or growing the rectangle about its
    /// center. The factor is clamped to the configured range.
    pub fn set_zoom(&mut self, zoom: f32) -> Result<CropRect> {
        if !zoom.is_finite() {
            return Err(GridError::validation("zoom must be a finite number"));
        }
        let zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        let (width, height) = self.source_size();
        let max_side = width.min(height);

        let side = self.rect.width as f64 * self.zoom as f64 / zoom as f64;
        let side = (side.round() as u32).clamp(1, max_side);
        let center_x = self.rect.x as f64 + self.rect.width as f64 / 2.0;
        let center_y = self.rect.y as f64 + self.rect.height as f64 / 2.0;

        self.rect = CropRect::new(
            place(center_x, side, width),
            place(center_y, side, height),
            side,
            side,
        );
        self.zoom = zoom;
        Ok(self.rect)
    }

    /// Moves the rectangle by a pixel offset, stopping at the source edges.
    pub fn pan(&mut self, dx: i64, dy: i64) -> CropRect {
        let (width, height) = self.source_size();
        let max_x = (width - self.rect.width) as i64;
        let max_y = (height - self.rect.height) as i64;
        self.rect.x = (self.rect.x as i64 + dx).clamp(0, max_x) as u32;
        self.rect.y = (self.rect.y as i64 + dy).clamp(0, max_y) as u32;
        self.rect
    }
}

fn place(center: f64, side: u32, limit: u32) -> u32 {
    let origin = (center - side as f64 / 2.0).round().max(0.0) as u32;
    origin.min(limit - side)
}
