//! JSON table files.
//!
//! Writes go to a hidden temporary file in the target directory and are then
//! renamed over the target, so a reader never sees a half-written table.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use roscenes_core::records::{table_file_name, ALL_TABLES};

use crate::error::{PipelineError, Result};

pub fn table_path(dir: &Path, table: &str) -> PathBuf {
    dir.join(table_file_name(table))
}

/// Read and parse a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(PipelineError::MissingPath(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| PipelineError::json(path, e))
}

pub fn read_table(dir: &Path, table: &str) -> Result<Value> {
    read_json(&table_path(dir, table))
}

/// Serialize `value` and atomically replace `path`.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let parent = path
        .parent()
        .ok_or_else(|| PipelineError::MissingPath(path.to_path_buf()))?;
    std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;

    let bytes = serde_json::to_vec_pretty(value).map_err(|e| PipelineError::json(path, e))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp = parent.join(format!(".{file_name}.{}.{seq}.tmp", std::process::id()));

    std::fs::write(&tmp, bytes).map_err(|e| PipelineError::io(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(PipelineError::io(path, e));
    }
    Ok(())
}

pub fn write_table(dir: &Path, table: &str, rows: &Value) -> Result<()> {
    write_json(&table_path(dir, table), rows)
}

/// Record count of every known table present in `dir`.
///
/// Missing tables are left out; a table that is not an array is an error.
pub fn table_counts(dir: &Path) -> Result<BTreeMap<String, usize>> {
    if !dir.is_dir() {
        return Err(PipelineError::MissingPath(dir.to_path_buf()));
    }
    let mut counts = BTreeMap::new();
    for table in ALL_TABLES {
        let path = table_path(dir, table);
        if !path.exists() {
            continue;
        }
        let value: Value = read_json(&path)?;
        let count = value
            .as_array()
            .map(Vec::len)
            .ok_or_else(|| roscenes_core::error::CoreError::MalformedRecord {
                table: table.to_string(),
                reason: "table is not a JSON array".to_string(),
            })?;
        counts.insert(table.to_string(), count);
    }
    Ok(counts)
}

/// Whether a table exists and holds at least one record.
pub fn table_has_records(dir: &Path, table: &str) -> bool {
    matches!(
        read_table(dir, table),
        Ok(Value::Array(rows)) if !rows.is_empty()
    )
}
