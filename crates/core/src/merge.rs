//! Table merge reconciliation.
//!
//! Records are keyed by `token`. Later inputs overwrite earlier ones, except
//! in the map table where a repeated token keeps the first record and gains
//! the union of both `log_tokens` lists. Output keeps first-seen order.
//!
//! A [`TableMerge`] walks one table through
//! `NotStarted -> ReadingInputs -> Reconciling -> Writing -> Done`. Every
//! input is parsed and checked before any of them is applied, so a malformed
//! input never leaves a partially merged table behind.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde_json::Value;

use crate::error::CoreError;
use crate::records::MAP_TABLE;

// ---------------------------------------------------------------------------
// Record keys
// ---------------------------------------------------------------------------

/// Merge key of a record. Visibility tokens are integers, so numbers are
/// accepted and stringified.
pub fn record_key(table: &str, record: &Value) -> Result<String, CoreError> {
    match record.get("token") {
        Some(Value::String(token)) => Ok(token.clone()),
        Some(Value::Number(token)) => Ok(token.to_string()),
        Some(other) => Err(CoreError::MalformedRecord {
            table: table.to_string(),
            reason: format!("token must be a string or number, got {other}"),
        }),
        None => Err(CoreError::MalformedRecord {
            table: table.to_string(),
            reason: "record has no token".to_string(),
        }),
    }
}

/// Check that a parsed table is an array of objects with tokens.
pub fn validate_table(table: &str, value: Value) -> Result<Vec<Value>, CoreError> {
    let Value::Array(records) = value else {
        return Err(CoreError::MalformedRecord {
            table: table.to_string(),
            reason: "table must be a JSON array".to_string(),
        });
    };
    for record in &records {
        if !record.is_object() {
            return Err(CoreError::MalformedRecord {
                table: table.to_string(),
                reason: "table entries must be JSON objects".to_string(),
            });
        }
        record_key(table, record)?;
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Token-keyed accumulator for one table.
#[derive(Debug)]
pub struct Reconciler {
    table: String,
    union_log_tokens: bool,
    order: Vec<String>,
    records: HashMap<String, Value>,
}

impl Reconciler {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            union_log_tokens: table == MAP_TABLE,
            order: Vec::new(),
            records: HashMap::new(),
        }
    }

    /// Apply one input collection on top of the accumulator.
    pub fn absorb(&mut self, records: Vec<Value>) -> Result<(), CoreError> {
        for record in records {
            let key = record_key(&self.table, &record)?;
            match self.records.get_mut(&key) {
                None => {
                    self.order.push(key.clone());
                    self.records.insert(key, record);
                }
                Some(existing) if self.union_log_tokens => {
                    append_log_tokens(&self.table, existing, &record)?;
                }
                Some(existing) => *existing = record,
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Merged records in first-seen order. Map `log_tokens` are deduplicated
    /// and sorted.
    pub fn finish(mut self) -> Vec<Value> {
        let union = self.union_log_tokens;
        self.order
            .into_iter()
            .filter_map(|key| self.records.remove(&key))
            .map(|mut record| {
                if union {
                    dedup_log_tokens(&mut record);
                }
                record
            })
            .collect()
    }
}

fn log_tokens_of<'a>(table: &str, record: &'a Value) -> Result<Vec<&'a Value>, CoreError> {
    match record.get("log_tokens") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(tokens)) => Ok(tokens.iter().collect()),
        Some(other) => Err(CoreError::MalformedRecord {
            table: table.to_string(),
            reason: format!("log_tokens must be an array, got {other}"),
        }),
    }
}

fn append_log_tokens(table: &str, existing: &mut Value, incoming: &Value) -> Result<(), CoreError> {
    let mut combined: Vec<Value> = log_tokens_of(table, existing)?
        .into_iter()
        .cloned()
        .collect();
    combined.extend(log_tokens_of(table, incoming)?.into_iter().cloned());
    if let Some(object) = existing.as_object_mut() {
        object.insert("log_tokens".to_string(), Value::Array(combined));
    }
    Ok(())
}

fn dedup_log_tokens(record: &mut Value) {
    let Some(Value::Array(tokens)) = record.get_mut("log_tokens") else {
        return;
    };
    let unique: BTreeSet<String> = tokens
        .iter()
        .map(|t| match t {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();
    *tokens = unique.into_iter().map(Value::String).collect();
}

/// Merge several collections of one table in order.
pub fn merge(table: &str, inputs: Vec<Vec<Value>>) -> Result<Vec<Value>, CoreError> {
    let mut reconciler = Reconciler::new(table);
    for input in inputs {
        reconciler.absorb(input)?;
    }
    Ok(reconciler.finish())
}

// ---------------------------------------------------------------------------
// Merge state machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    NotStarted,
    ReadingInputs,
    Reconciling,
    Writing,
    Done,
    Failed,
}

impl MergeState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::ReadingInputs => "reading_inputs",
            Self::Reconciling => "reconciling",
            Self::Writing => "writing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for MergeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Merge of one table across many inputs.
#[derive(Debug)]
pub struct TableMerge {
    table: String,
    state: MergeState,
    inputs: Vec<Vec<Value>>,
    merged: Vec<Value>,
}

impl TableMerge {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            state: MergeState::NotStarted,
            inputs: Vec::new(),
            merged: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn state(&self) -> MergeState {
        self.state
    }

    fn expect_state(&self, allowed: &[MergeState], action: &str) -> Result<(), CoreError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "Cannot {action} table '{}' in state {}",
                self.table, self.state
            )))
        }
    }

    /// Queue one parsed input. A malformed input fails the whole merge.
    pub fn read_input(&mut self, value: Value) -> Result<(), CoreError> {
        self.expect_state(
            &[MergeState::NotStarted, MergeState::ReadingInputs],
            "read input for",
        )?;
        self.state = MergeState::ReadingInputs;
        match validate_table(&self.table, value) {
            Ok(records) => {
                self.inputs.push(records);
                Ok(())
            }
            Err(e) => {
                self.fail();
                Err(e)
            }
        }
    }

    /// Mark the merge failed; nothing is written afterwards.
    pub fn fail(&mut self) {
        self.state = MergeState::Failed;
        self.inputs.clear();
        self.merged.clear();
    }

    /// Apply every queued input. With no inputs the result is empty.
    pub fn reconcile(&mut self) -> Result<usize, CoreError> {
        self.expect_state(
            &[MergeState::NotStarted, MergeState::ReadingInputs],
            "reconcile",
        )?;
        self.state = MergeState::Reconciling;
        match merge(&self.table, std::mem::take(&mut self.inputs)) {
            Ok(merged) => {
                self.merged = merged;
                Ok(self.merged.len())
            }
            Err(e) => {
                self.fail();
                Err(e)
            }
        }
    }

    /// Hand out the merged records for writing.
    pub fn begin_write(&mut self) -> Result<Vec<Value>, CoreError> {
        self.expect_state(&[MergeState::Reconciling], "write")?;
        self.state = MergeState::Writing;
        Ok(std::mem::take(&mut self.merged))
    }

    pub fn finish(&mut self) -> Result<(), CoreError> {
        self.expect_state(&[MergeState::Writing], "finish")?;
        self.state = MergeState::Done;
        Ok(())
    }
}
