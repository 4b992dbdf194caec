//! Payload parsers: raw bytes to a `Dataset`.

use super::provider::FetchError;
use crate::dataset::Dataset;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Supported payload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parser {
    /// Headered CSV. Cells and column names are trimmed.
    #[default]
    Csv,
    /// JSON array of flat objects.
    JsonRecords,
}

impl Parser {
    pub fn parse(&self, raw: &[u8]) -> Result<Dataset, FetchError> {
        let raw = raw.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(raw);
        if raw.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(FetchError::Parse("empty payload".into()));
        }
        if looks_like_html(raw) {
            return Err(FetchError::Parse(
                "received an HTML page instead of tabular data".into(),
            ));
        }
        match self {
            Parser::Csv => parse_csv(raw),
            Parser::JsonRecords => parse_json_records(raw),
        }
    }
}

fn looks_like_html(raw: &[u8]) -> bool {
    let head: Vec<u8> = raw
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take(16)
        .map(|b| b.to_ascii_lowercase())
        .collect();
    head.starts_with(b"<!doctype") || head.starts_with(b"<html")
}

fn parse_csv(raw: &[u8]) -> Result<Dataset, FetchError> {
    Dataset::from_csv(raw)
        .and_then(Dataset::trimmed)
        .map_err(|e| FetchError::Parse(e.to_string()))
}

fn parse_json_records(raw: &[u8]) -> Result<Dataset, FetchError> {
    let records: Vec<serde_json::Map<String, Value>> = serde_json::from_slice(raw)
        .map_err(|e| FetchError::Parse(format!("expected a JSON array of objects: {e}")))?;

    // Union of keys, in order of first appearance across records.
    let mut columns: Vec<String> = Vec::new();
    for record in &records {
        for key in record.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }

    let mut rows = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        let mut row = Vec::with_capacity(columns.len());
        for col in &columns {
            let cell = match record.get(col) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.trim().to_string(),
                Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string(),
                Some(Value::Array(_) | Value::Object(_)) => {
                    return Err(FetchError::Parse(format!(
                        "record {i}: nested value in column '{col}'"
                    )))
                }
            };
            row.push(cell);
        }
        rows.push(row);
    }

    Dataset::new(columns, rows).map_err(|e| FetchError::Parse(e.to_string()))
}
