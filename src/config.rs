//! Grid configuration, loaded from a JSON file with every field optional.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::state::i18n::Language;
use crate::state::schema::Schema;
use crate::state::view::{DEFAULT_FILTER_COLUMN, DEFAULT_PAGE_SIZE};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub page_size: usize,
    /// Column matched by the text filter.
    pub filter_column: String,
    /// Columns that accept inline edits.
    pub editable_columns: Vec<String>,
    pub columns: Schema,
    /// Column that holds the public reference of the product image.
    pub image_field: String,
    /// Leading segment of every uploaded object path.
    pub storage_prefix: String,
    pub max_upload_bytes: usize,
    pub jpeg_quality: u8,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub language: Language,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            filter_column: DEFAULT_FILTER_COLUMN.to_string(),
            editable_columns: vec!["price".to_string(), "stock".to_string()],
            columns: Schema::products(),
            image_field: "image_url".to_string(),
            storage_prefix: "public".to_string(),
            max_upload_bytes: 5 * 1024 * 1024,
            jpeg_quality: 90,
            min_zoom: 1.0,
            max_zoom: 3.0,
            language: Language::En,
        }
    }
}

impl GridConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        Ok(config.normalized())
    }

    pub fn is_editable(&self, column: &str) -> bool {
        self.editable_columns.iter().any(|c| c == column)
    }

    fn normalized(mut self) -> Self {
        self.page_size = self.page_size.max(1);
        self.jpeg_quality = self.jpeg_quality.clamp(1, 100);
        if !(self.min_zoom > 0.0) {
            self.min_zoom = 1.0;
        }
        if !(self.max_zoom >= self.min_zoom) {
            self.max_zoom = self.min_zoom;
        }
        self
    }
}
