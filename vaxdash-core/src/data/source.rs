//! Source descriptors and the validated, priority-ordered source set.

use super::parse::Parser;
use super::provider::{FetchError, SourceLocation};
use super::schema::Schema;
use crate::dataset::Dataset;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

/// One named source of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDescriptor {
    pub name: String,
    /// Lower value = tried earlier. Unique within a `SourceSet`.
    pub priority: u32,
    pub location: SourceLocation,
    pub parser: Parser,
    pub schema: Schema,
    /// Source column -> canonical column, applied before schema validation.
    pub renames: BTreeMap<String, String>,
    pub enabled: bool,
}

impl SourceDescriptor {
    pub fn new(
        name: impl Into<String>,
        priority: u32,
        location: SourceLocation,
        schema: Schema,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            location,
            parser: Parser::Csv,
            schema,
            renames: BTreeMap::new(),
            enabled: true,
        }
    }

    pub fn with_parser(mut self, parser: Parser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renames.insert(from.into(), to.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Parse a raw payload, apply renames, and validate against the schema.
    ///
    /// Schema violations are reported as parse errors.
    pub fn parse(&self, raw: &[u8]) -> Result<Dataset, FetchError> {
        let dataset = self
            .parser
            .parse(raw)?
            .with_renames(&self.renames)
            .map_err(|e| FetchError::Parse(e.to_string()))?;
        self.schema
            .validate(&dataset)
            .map_err(|e| FetchError::Parse(format!("schema validation failed: {e}")))?;
        Ok(dataset)
    }
}

/// Problems found while validating a source set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("dataset '{0}' has no sources")]
    NoSources(String),

    #[error("dataset '{dataset}': duplicate source name '{name}'")]
    DuplicateName { dataset: String, name: String },

    #[error("dataset '{dataset}': sources '{first}' and '{second}' share priority {priority}")]
    DuplicatePriority {
        dataset: String,
        priority: u32,
        first: String,
        second: String,
    },

    #[error("dataset '{dataset}': source '{source_name}' has an empty schema")]
    EmptySchema { dataset: String, source_name: String },

    #[error("dataset '{dataset}': synthetic source '{source_name}' must use the csv parser")]
    SyntheticParser { dataset: String, source_name: String },
}

/// The validated sources of one dataset, sorted by ascending priority.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSet {
    dataset: String,
    sources: Vec<SourceDescriptor>,
}

impl SourceSet {
    pub fn new(
        dataset: impl Into<String>,
        mut sources: Vec<SourceDescriptor>,
    ) -> Result<Self, SourceError> {
        let dataset = dataset.into();
        if sources.is_empty() {
            return Err(SourceError::NoSources(dataset));
        }

        let mut names: HashSet<&str> = HashSet::new();
        let mut priorities: HashMap<u32, &str> = HashMap::new();
        for source in &sources {
            if !names.insert(source.name.as_str()) {
                return Err(SourceError::DuplicateName {
                    dataset,
                    name: source.name.clone(),
                });
            }
            if let Some(first) = priorities.insert(source.priority, source.name.as_str()) {
                return Err(SourceError::DuplicatePriority {
                    dataset,
                    priority: source.priority,
                    first: first.to_string(),
                    second: source.name.clone(),
                });
            }
            if source.schema.is_empty() {
                return Err(SourceError::EmptySchema {
                    dataset,
                    source_name: source.name.clone(),
                });
            }
            if matches!(source.location, SourceLocation::Synthetic { .. })
                && source.parser != Parser::Csv
            {
                return Err(SourceError::SyntheticParser {
                    dataset,
                    source_name: source.name.clone(),
                });
            }
        }

        sources.sort_by_key(|s| s.priority);
        Ok(Self { dataset, sources })
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// All sources in priority order, including disabled ones.
    pub fn iter(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.sources.iter()
    }

    /// Enabled sources in priority order.
    pub fn enabled(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.sources.iter().filter(|s| s.enabled)
    }

    pub fn all_disabled(&self) -> bool {
        self.sources.iter().all(|s| !s.enabled)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
