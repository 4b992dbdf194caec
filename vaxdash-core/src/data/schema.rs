//! Required-column schema checked against every parsed dataset.

use crate::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Required columns a source's dataset must carry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    required: BTreeSet<String>,
}

impl Schema {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.required.iter().map(|c| c.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }

    /// Validate a dataset: all required columns present, at least one row.
    pub fn validate(&self, dataset: &Dataset) -> Result<(), SchemaError> {
        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|c| !dataset.has_column(c))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(SchemaError::MissingColumns(missing));
        }
        if dataset.is_empty() {
            return Err(SchemaError::NoRows);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("dataset has no rows")]
    NoRows,
}
