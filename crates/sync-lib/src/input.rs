//! Reading container inspection snapshots
//!
//! The whole document must be a JSON array; anything else is fatal. Each
//! element is then decoded on its own so one malformed record does not
//! poison the batch.

use crate::error::{Result, SyncError};
use crate::models::ContainerRecord;
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

/// One element of the input sequence
#[derive(Debug)]
pub struct InputEntry {
    pub index: usize,
    /// Display name, or a positional placeholder when the record has none
    pub name: String,
    pub container: Result<ContainerRecord>,
}

/// Read and parse an inspection file
pub fn read_inspection_file(path: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path).map_err(|source| SyncError::InputUnreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let records = parse_inspection(&content)?;
    info!(path = %path.display(), count = records.len(), "Loaded container inspection records");
    Ok(records)
}

/// Parse an inspection document into raw records
pub fn parse_inspection(content: &str) -> Result<Vec<Value>> {
    let document: Value =
        serde_json::from_str(content).map_err(|e| SyncError::InputFormat(e.to_string()))?;

    match document {
        Value::Array(records) => Ok(records),
        other => Err(SyncError::InputFormat(format!(
            "expected an array of container records, found {}",
            json_kind(&other)
        ))),
    }
}

/// Decode each raw record into a typed container record
pub fn decode_records(records: Vec<Value>) -> Vec<InputEntry> {
    records
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            let name = fallback_name(&value, index);
            let container = serde_json::from_value::<ContainerRecord>(value)
                .map_err(|e| SyncError::malformed(&name, e.to_string()));

            if let Err(e) = &container {
                warn!(index = index, container = %name, error = %e, "Skipping malformed container record");
            }

            InputEntry {
                index,
                name,
                container,
            }
        })
        .collect()
}

/// Best-effort display name for reporting, available even when decoding fails
fn fallback_name(value: &Value, index: usize) -> String {
    let name = value
        .get("Name")
        .and_then(Value::as_str)
        .map(|n| n.strip_prefix('/').unwrap_or(n))
        .filter(|n| !n.is_empty());

    match name {
        Some(n) => n.to_string(),
        None => match value.get("Id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.chars().take(12).collect(),
            _ => format!("#{}", index + 1),
        },
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
