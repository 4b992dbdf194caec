//! Fetch configuration: retry policy, HTTP settings, directories, and the
//! per-dataset source lists.
//!
//! Stored as TOML. Any key left out of a file takes its value from
//! [`FetchConfig::default_korea`], so a file containing only `retries = 5`
//! is a complete configuration.

use crate::data::backoff::{Backoff, RetryPolicy};
use crate::data::http::DEFAULT_USER_AGENT;
use crate::data::parse::Parser;
use crate::data::provider::{SourceLocation, SyntheticFeed};
use crate::data::schema::Schema;
use crate::data::source::{SourceDescriptor, SourceError, SourceSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const VACCINATION: &str = "vaccination";
pub const DAILY_STATS: &str = "daily_stats";
pub const REGIONAL: &str = "regional";

const KDCA_VACCINATION_URL: &str = "https://ncv.kdca.go.kr/eng/mainStatus.es?mid=a11702000000";
const KDCA_DAILY_STATS_URL: &str = "https://ncv.kdca.go.kr/eng/bdBoardList.es?mid=a30401000000";
const KDCA_REGIONAL_URL: &str = "https://ncv.kdca.go.kr/eng/mainStatus.es?mid=a11703000000";
const OWID_VACCINATION_URL: &str = "https://raw.githubusercontent.com/owid/covid-19-data/master/public/data/vaccinations/country_data/South%20Korea.csv";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {reason}", .path.display())]
    Read { path: PathBuf, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("config defines no datasets")]
    NoDatasets,

    #[error("dataset '{0}' is defined more than once")]
    DuplicateDataset(String),

    #[error("invalid dataset name '{0}' (use lowercase letters, digits, '_' or '-')")]
    InvalidDatasetName(String),

    #[error("unknown dataset '{0}'")]
    UnknownDataset(String),
}

/// One source entry of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub priority: u32,
    pub location: SourceLocation,
    #[serde(default)]
    pub parser: Parser,
    /// Source column -> canonical column.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub renames: BTreeMap<String, String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// A dataset: the columns every source must deliver, and where to get them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub name: String,
    pub required_columns: Vec<String>,
    pub sources: Vec<SourceConfig>,
}

impl DatasetConfig {
    /// Build the validated source set for this dataset.
    pub fn source_set(&self) -> Result<SourceSet, SourceError> {
        let schema = Schema::new(self.required_columns.iter().cloned());
        let descriptors = self
            .sources
            .iter()
            .map(|s| SourceDescriptor {
                name: s.name.clone(),
                priority: s.priority,
                location: s.location.clone(),
                parser: s.parser,
                schema: schema.clone(),
                renames: s.renames.clone(),
                enabled: s.enabled,
            })
            .collect();
        SourceSet::new(self.name.clone(), descriptors)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Retries per source after the first attempt.
    pub retries: u32,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,
    pub backoff: Backoff,
    pub datasets: Vec<DatasetConfig>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::default_korea()
    }
}

impl FetchConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// The built-in KDCA, OWID, and simulated sources for South Korea.
    pub fn default_korea() -> Self {
        let http = |name: &str, priority, url: &str| SourceConfig {
            name: name.into(),
            priority,
            location: SourceLocation::Http { url: url.into() },
            parser: Parser::Csv,
            renames: BTreeMap::new(),
            enabled: true,
        };
        let simulated = |priority, feed| SourceConfig {
            name: "simulated".into(),
            priority,
            location: SourceLocation::Synthetic { feed, seed: 42 },
            parser: Parser::Csv,
            renames: BTreeMap::new(),
            enabled: true,
        };
        let columns = |cols: &[&str]| -> Vec<String> { cols.iter().map(|c| c.to_string()).collect() };

        let mut owid = http("owid", 2, OWID_VACCINATION_URL);
        owid.renames = [
            ("people_vaccinated", "cumulative_first_dose"),
            ("people_fully_vaccinated", "cumulative_second_dose"),
            ("total_boosters", "cumulative_booster"),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();

        Self {
            retries: 3,
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cache_dir: PathBuf::from("data/raw"),
            output_dir: PathBuf::from("data/processed"),
            backoff: Backoff::default(),
            datasets: vec![
                DatasetConfig {
                    name: VACCINATION.into(),
                    required_columns: columns(&[
                        "date",
                        "cumulative_first_dose",
                        "cumulative_second_dose",
                        "cumulative_booster",
                    ]),
                    sources: vec![
                        http("kdca", 1, KDCA_VACCINATION_URL),
                        owid,
                        simulated(3, SyntheticFeed::Vaccination),
                    ],
                },
                DatasetConfig {
                    name: DAILY_STATS.into(),
                    required_columns: columns(&["date", "daily_cases", "daily_deaths"]),
                    sources: vec![
                        http("kdca", 1, KDCA_DAILY_STATS_URL),
                        simulated(2, SyntheticFeed::DailyStats),
                    ],
                },
                DatasetConfig {
                    name: REGIONAL.into(),
                    required_columns: columns(&[
                        "region",
                        "population",
                        "first_dose",
                        "second_dose",
                        "booster",
                    ]),
                    sources: vec![
                        http("kdca", 1, KDCA_REGIONAL_URL),
                        simulated(2, SyntheticFeed::Regional),
                    ],
                },
            ],
        }
    }

    /// Check dataset names and every source set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.datasets.is_empty() {
            return Err(ConfigError::NoDatasets);
        }
        let mut seen = HashSet::new();
        for dataset in &self.datasets {
            let valid = !dataset.name.is_empty()
                && dataset
                    .name
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
            if !valid {
                return Err(ConfigError::InvalidDatasetName(dataset.name.clone()));
            }
            if !seen.insert(dataset.name.as_str()) {
                return Err(ConfigError::DuplicateDataset(dataset.name.clone()));
            }
            dataset.source_set()?;
        }
        Ok(())
    }

    /// Source sets for every dataset, in config order.
    pub fn source_sets(&self) -> Result<Vec<SourceSet>, ConfigError> {
        self.datasets
            .iter()
            .map(|d| d.source_set().map_err(ConfigError::from))
            .collect()
    }

    /// Source set for one dataset by name.
    pub fn dataset(&self, name: &str) -> Result<SourceSet, ConfigError> {
        self.datasets
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| ConfigError::UnknownDataset(name.to_string()))?
            .source_set()
            .map_err(ConfigError::from)
    }

    pub fn dataset_names(&self) -> Vec<&str> {
        self.datasets.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            backoff: self.backoff,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}
