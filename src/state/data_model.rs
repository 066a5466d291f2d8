use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A raw product row as exchanged with a JSON catalog.
pub type Row = BTreeMap<String, Value>;

/// Column holding the row identity in raw rows.
pub const ID_COLUMN: &str = "id";

/// Stable identity of a row. Never derived from display fields.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Draft,
    Archived,
}

impl ProductStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Draft => "draft",
            Self::Archived => "archived",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "draft" => Some(Self::Draft),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// Typed value of one cell.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Integer(i64),
    Status(ProductStatus),
    /// Nullable reference, e.g. the public URL of a product image.
    Url(Option<String>),
}

impl CellValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Number(n) => json_number(*n),
            Self::Integer(i) => Value::Number((*i).into()),
            Self::Status(status) => Value::String(status.as_str().to_string()),
            Self::Url(Some(url)) => Value::String(url.clone()),
            Self::Url(None) => Value::Null,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Status(status) => f.write_str(status.as_str()),
            Self::Url(Some(url)) => f.write_str(url),
            Self::Url(None) => Ok(()),
        }
    }
}

/// One product row: identity, typed columns and the columns that currently
/// carry an unacknowledged optimistic edit.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    id: EntityId,
    values: BTreeMap<String, CellValue>,
    dirty: BTreeSet<String>,
}

impl Entity {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            values: BTreeMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    pub fn with(mut self, column: &str, value: CellValue) -> Self {
        self.values.insert(column.to_string(), value);
        self
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.values.get(column)
    }

    pub fn values(&self) -> &BTreeMap<String, CellValue> {
        &self.values
    }

    pub fn set(&mut self, column: &str, value: CellValue) -> Option<CellValue> {
        self.values.insert(column.to_string(), value)
    }

    pub fn remove(&mut self, column: &str) -> Option<CellValue> {
        self.values.remove(column)
    }

    pub fn is_dirty(&self, column: &str) -> bool {
        self.dirty.contains(column)
    }

    pub fn dirty_columns(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    pub(crate) fn mark_dirty(&mut self, column: &str) {
        self.dirty.insert(column.to_string());
    }

    pub(crate) fn clear_dirty(&mut self, column: &str) {
        self.dirty.remove(column);
    }

    pub fn display(&self, column: &str) -> String {
        self.get(column).map(ToString::to_string).unwrap_or_default()
    }

    pub fn to_row(&self) -> Row {
        let mut row: Row = self
            .values
            .iter()
            .map(|(column, value)| (column.clone(), value.to_json()))
            .collect();
        row.insert(ID_COLUMN.to_string(), Value::String(self.id.0.clone()));
        row
    }
}

/// Formats a JSON value for display in a table cell.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

pub(crate) fn json_number(value: f64) -> Value {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        return Value::Number((value as i64).into());
    }
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return String::new();
    }
    if value.fract() == 0.0 {
        return format!("{value:.0}");
    }
    let mut out = format!("{value:.6}");
    while out.ends_with('0') {
        out.pop();
    }
    if out.ends_with('.') {
        out.pop();
    }
    out
}
