//! Dataset loading for the pipeline.
//!
//! Fetches every configured dataset through one `Fetcher`. A dataset that
//! cannot be obtained from any source or from the cache does not stop the
//! others; all such failures are collected and reported together.

use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;
use vaxdash_core::data::{AggregateFetchError, FetchOutcome, Fetcher};
use vaxdash_core::{ConfigError, FetchConfig};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{} dataset(s) unavailable: {}", .0.len(), names(.0))]
    Unavailable(Vec<AggregateFetchError>),
}

fn names(failures: &[AggregateFetchError]) -> String {
    failures
        .iter()
        .map(|f| f.dataset.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Progress callbacks for a multi-dataset fetch.
pub trait FetchProgress {
    /// Called before fetching a dataset.
    fn on_start(&self, dataset: &str, index: usize, total: usize);

    /// Called when a dataset fetch completes.
    fn on_complete(
        &self,
        dataset: &str,
        index: usize,
        total: usize,
        result: &Result<FetchOutcome, AggregateFetchError>,
    );
}

/// Fetched datasets keyed by name.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub outcomes: BTreeMap<String, FetchOutcome>,
}

impl LoadedData {
    pub fn get(&self, dataset: &str) -> Option<&FetchOutcome> {
        self.outcomes.get(dataset)
    }

    /// Datasets served from cache, in name order.
    pub fn stale_sources(&self) -> Vec<String> {
        self.outcomes
            .values()
            .filter(|o| o.is_stale)
            .map(|o| o.dataset_name.clone())
            .collect()
    }

    /// Human-readable origin per dataset.
    pub fn origins(&self) -> BTreeMap<String, String> {
        self.outcomes
            .iter()
            .map(|(name, o)| (name.clone(), o.origin.to_string()))
            .collect()
    }
}

/// Fetch every dataset in `config`.
pub fn load_all(
    config: &FetchConfig,
    fetcher: &Fetcher<'_>,
    force_refresh: bool,
    progress: Option<&dyn FetchProgress>,
) -> Result<LoadedData, LoadError> {
    let sets = config.source_sets()?;
    let total = sets.len();
    let mut outcomes = BTreeMap::new();
    let mut failures = Vec::new();

    for (i, sources) in sets.iter().enumerate() {
        if let Some(p) = progress {
            p.on_start(sources.dataset(), i, total);
        }
        let result = fetcher.fetch(sources, force_refresh);
        if let Some(p) = progress {
            p.on_complete(sources.dataset(), i, total, &result);
        }
        match result {
            Ok(outcome) => {
                outcomes.insert(sources.dataset().to_string(), outcome);
            }
            Err(e) => failures.push(e),
        }
    }

    if !failures.is_empty() {
        return Err(LoadError::Unavailable(failures));
    }

    let stale = outcomes.values().filter(|o| o.is_stale).count();
    info!(datasets = outcomes.len(), stale, "all datasets loaded");
    Ok(LoadedData { outcomes })
}
