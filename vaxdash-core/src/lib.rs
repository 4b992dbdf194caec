//! vaxdash core: fetching South Korea COVID-19 vaccination data.
//!
//! - Tabular `Dataset` with typed accessors
//! - Source descriptors, transports, and payload parsers
//! - Multi-source fetcher with per-source retry, priority fallback, and a CSV cache
//! - TOML fetch configuration with built-in KDCA/OWID/simulated sources

pub mod config;
pub mod data;
pub mod dataset;
pub mod domain;

pub use config::{ConfigError, DatasetConfig, FetchConfig, SourceConfig};
pub use dataset::{Dataset, DatasetError};
