use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GridError, Result};
use crate::state::data_model::{self, CellValue, Entity, EntityId, ProductStatus, Row, ID_COLUMN};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Number,
    Integer,
    Status,
    Url,
}

/// Declared column types. Columns without a declaration are inferred from
/// their JSON shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    columns: BTreeMap<String, ColumnType>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::products()
    }
}

impl Schema {
    pub fn new(columns: BTreeMap<String, ColumnType>) -> Self {
        Self { columns }
    }

    /// The vendor product table.
    pub fn products() -> Self {
        Self::new(BTreeMap::from([
            ("name".to_string(), ColumnType::Text),
            ("price".to_string(), ColumnType::Number),
            ("stock".to_string(), ColumnType::Integer),
            ("status".to_string(), ColumnType::Status),
            ("image_url".to_string(), ColumnType::Url),
            ("created_at".to_string(), ColumnType::Text),
        ]))
    }

    pub fn column_type(&self, column: &str) -> Option<ColumnType> {
        self.columns.get(column).copied()
    }

    pub fn set_column_type(&mut self, column: &str, column_type: Option<ColumnType>) {
        match column_type {
            Some(column_type) => {
                self.columns.insert(column.to_string(), column_type);
            }
            None => {
                self.columns.remove(column);
            }
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.columns.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    /// Converts a stored JSON value. Returns `None` when the value does not
    /// fit the declared type.
    pub fn coerce_json(&self, column: &str, value: &Value) -> Option<CellValue> {
        match self.column_type(column) {
            Some(column_type) => coerce_json(value, column_type),
            None => Some(infer_json(value)),
        }
    }

    /// Converts raw user input for a cell. Numeric columns never fail:
    /// input without a numeric prefix becomes zero.
    pub fn coerce_input(&self, column: &str, raw: &str) -> Result<CellValue> {
        let column_type = self.column_type(column).unwrap_or(ColumnType::Text);
        match column_type {
            ColumnType::Text => Ok(CellValue::Text(raw.to_string())),
            ColumnType::Number => Ok(CellValue::Number(parse_lenient(raw))),
            ColumnType::Integer => Ok(CellValue::Integer(parse_lenient(raw).trunc() as i64)),
            ColumnType::Status => ProductStatus::parse(raw)
                .map(CellValue::Status)
                .ok_or_else(|| GridError::validation(format!("unknown status '{}'", raw.trim()))),
            ColumnType::Url => {
                let trimmed = raw.trim();
                Ok(CellValue::Url(
                    (!trimmed.is_empty()).then(|| trimmed.to_string()),
                ))
            }
        }
    }

    pub fn entity_from_row(&self, row: &Row) -> Result<Entity> {
        let id = match row.get(ID_COLUMN) {
            Some(Value::String(s)) if !s.trim().is_empty() => EntityId::new(s.clone()),
            Some(Value::Number(n)) => EntityId::new(n.to_string()),
            _ => return Err(GridError::validation("row is missing an identity")),
        };

        let mut entity = Entity::new(id);
        for (column, value) in row {
            if column == ID_COLUMN {
                continue;
            }
            let Some(cell) = self.coerce_json(column, value) else {
                return Err(GridError::validation(format!(
                    "column '{column}' of row '{}' does not match declared type",
                    entity.id()
                )));
            };
            entity.set(column, cell);
        }
        Ok(entity)
    }
}

fn coerce_json(value: &Value, column_type: ColumnType) -> Option<CellValue> {
    match column_type {
        ColumnType::Text => Some(CellValue::Text(data_model::display_value(value))),
        ColumnType::Number => match value {
            Value::Number(n) => n.as_f64().map(CellValue::Number),
            Value::String(s) => s.trim().parse::<f64>().ok().map(CellValue::Number),
            Value::Null => Some(CellValue::Number(0.0)),
            _ => None,
        },
        ColumnType::Integer => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                .map(CellValue::Integer),
            Value::String(s) => s.trim().parse::<i64>().ok().map(CellValue::Integer),
            Value::Null => Some(CellValue::Integer(0)),
            _ => None,
        },
        ColumnType::Status => match value {
            Value::String(s) => ProductStatus::parse(s).map(CellValue::Status),
            _ => None,
        },
        ColumnType::Url => match value {
            Value::Null => Some(CellValue::Url(None)),
            Value::String(s) if s.is_empty() => Some(CellValue::Url(None)),
            Value::String(s) => Some(CellValue::Url(Some(s.clone()))),
            _ => None,
        },
    }
}

fn infer_json(value: &Value) -> CellValue {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => CellValue::Integer(i),
            None => CellValue::Number(n.as_f64().unwrap_or_default()),
        },
        Value::Null => CellValue::Url(None),
        other => CellValue::Text(data_model::display_value(other)),
    }
}

/// Parses the longest numeric prefix of `raw` (`"12.5kg"` → 12.5); anything
/// without one, or a non-finite result, yields zero.
pub fn parse_lenient(raw: &str) -> f64 {
    let trimmed = raw.trim();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (idx, ch) in trimmed.char_indices() {
        match ch {
            '+' | '-' if idx == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = idx + ch.len_utf8();
    }
    if !seen_digit {
        return 0.0;
    }
    trimmed[..end]
        .trim_end_matches('.')
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}
