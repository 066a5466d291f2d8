use std::fs;
use std::io;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;

use crate::io::atomic_write;
use crate::state::data_model::{Entity, Row};
use crate::state::schema::Schema;

#[derive(Error, Debug)]
pub enum JsonIoError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("JSON root is not an array")]
    NotAnArray,
    #[error("JSON array contains non-object elements")]
    NotArrayOfObjects,
    #[error("invalid product row: {0}")]
    InvalidRow(String),
}

pub fn load_json(path: &Path) -> Result<Vec<Row>, JsonIoError> {
    let content = fs::read_to_string(path)?;
    parse_rows(&content)
}

pub fn parse_rows(content: &str) -> Result<Vec<Row>, JsonIoError> {
    let value: Value = serde_json::from_str(content)?;

    match value {
        Value::Array(arr) => {
            let mut rows = Vec::with_capacity(arr.len());
            for item in arr {
                match item {
                    Value::Object(map) => {
                        rows.push(map.into_iter().collect());
                    }
                    _ => return Err(JsonIoError::NotArrayOfObjects),
                }
            }
            Ok(rows)
        }
        _ => Err(JsonIoError::NotAnArray),
    }
}

pub fn save_json(path: &Path, data: &[Row]) -> Result<(), JsonIoError> {
    let array: Vec<Value> = data
        .iter()
        .map(|row| {
            let map: serde_json::Map<String, Value> =
                row.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            Value::Object(map)
        })
        .collect();

    let json = serde_json::to_string_pretty(&array)?;
    atomic_write(path, json.as_bytes())?;
    Ok(())
}

/// Loads a product catalog and converts every row through `schema`.
pub fn load_products(path: &Path, schema: &Schema) -> Result<Vec<Entity>, JsonIoError> {
    load_json(path)?
        .iter()
        .map(|row| {
            schema
                .entity_from_row(row)
                .map_err(|err| JsonIoError::InvalidRow(err.to_string()))
        })
        .collect()
}

pub fn save_products(path: &Path, entities: &[Entity]) -> Result<(), JsonIoError> {
    let rows: Vec<Row> = entities.iter().map(Entity::to_row).collect();
    save_json(path, &rows)
}
