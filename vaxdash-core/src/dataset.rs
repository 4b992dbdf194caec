//! Tabular dataset produced by a successful fetch.
//!
//! A `Dataset` is a header row plus string cells. Keeping cells as strings
//! lets every source (CSV, JSON records, cache files) land in one shape;
//! typed access goes through `f64`/`value` or serde via `deserialize`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::io::Read;
use thiserror::Error;

/// Errors raised while building or converting a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("duplicate column '{0}'")]
    DuplicateColumn(String),

    #[error("csv error: {0}")]
    Csv(String),

    #[error("row {row}: {reason}")]
    Deserialize { row: usize, reason: String },
}

impl From<csv::Error> for DatasetError {
    fn from(e: csv::Error) -> Self {
        DatasetError::Csv(e.to_string())
    }
}

/// Named columns with rows of string cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    /// Build a dataset, checking column uniqueness and row width.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, DatasetError> {
        let mut seen = HashSet::new();
        for col in &columns {
            if !seen.insert(col.as_str()) {
                return Err(DatasetError::DuplicateColumn(col.clone()));
            }
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(DatasetError::RaggedRow {
                    row: i,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Read a headered CSV document verbatim (no trimming).
    pub fn from_csv<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let columns: Vec<String> = rdr.headers()?.iter().map(String::from).collect();
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(String::from).collect());
        }
        Self::new(columns, rows)
    }

    /// Build a dataset from serializable records (header taken from field names).
    pub fn from_records<T: Serialize>(records: &[T]) -> Result<Self, DatasetError> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        for record in records {
            wtr.serialize(record)?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| DatasetError::Csv(e.to_string()))?;
        Self::from_csv(bytes.as_slice())
    }

    /// Serialize to CSV bytes with a header row.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, DatasetError> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.into_inner().map_err(|e| DatasetError::Csv(e.to_string()))
    }

    /// Deserialize every row into `T`, matching fields by column name.
    ///
    /// Empty cells deserialize to `None` for `Option` fields.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<Vec<T>, DatasetError> {
        let headers = csv::StringRecord::from(self.columns.clone());
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                csv::StringRecord::from(row.clone())
                    .deserialize(Some(&headers))
                    .map_err(|e| DatasetError::Deserialize {
                        row: i,
                        reason: e.to_string(),
                    })
            })
            .collect()
    }

    /// Trim whitespace from column names and every cell.
    pub fn trimmed(self) -> Result<Self, DatasetError> {
        let columns = self.columns.iter().map(|c| c.trim().to_string()).collect();
        let rows = self
            .rows
            .into_iter()
            .map(|row| row.iter().map(|c| c.trim().to_string()).collect())
            .collect();
        Self::new(columns, rows)
    }

    /// Rename columns (`from -> to`). Unknown `from` names are ignored.
    pub fn with_renames(mut self, renames: &BTreeMap<String, String>) -> Result<Self, DatasetError> {
        if renames.is_empty() {
            return Ok(self);
        }
        for col in self.columns.iter_mut() {
            if let Some(to) = renames.get(col.as_str()) {
                *col = to.clone();
            }
        }
        Self::new(self.columns, self.rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Raw cell value at `(row, column)`.
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| r[idx].as_str())
    }

    /// Cell parsed as `f64`; empty or non-numeric cells yield `None`.
    pub fn f64(&self, row: usize, column: &str) -> Option<f64> {
        self.value(row, column)
            .filter(|v| !v.is_empty())
            .and_then(|v| v.parse().ok())
    }
}
