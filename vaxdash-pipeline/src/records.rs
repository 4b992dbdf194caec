//! Typed views of the fetched datasets.
//!
//! Columns beyond the ones named here are ignored. Optional columns may be
//! absent entirely or hold blanks; unparseable optional cells read as missing.

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;
use vaxdash_core::{Dataset, DatasetError};

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("{dataset}: {source}")]
    Records {
        dataset: &'static str,
        source: DatasetError,
    },

    #[error("{0} has no rows")]
    Empty(&'static str),

    #[error("dataset '{0}' was not loaded")]
    NotLoaded(&'static str),

    #[error("{dataset}: {reason}")]
    Invalid {
        dataset: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VaccinationRecord {
    pub date: NaiveDate,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub daily_first_dose: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub cumulative_first_dose: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub daily_second_dose: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub cumulative_second_dose: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub daily_booster: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub cumulative_booster: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub first_dose_percentage: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub second_dose_percentage: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub booster_percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DailyStatsRecord {
    pub date: NaiveDate,
    pub daily_cases: f64,
    pub daily_deaths: f64,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub daily_tests: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub positivity_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegionalRecord {
    pub region: String,
    pub population: f64,
    pub first_dose: f64,
    pub second_dose: f64,
    pub booster: f64,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub first_dose_percentage: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub second_dose_percentage: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub booster_percentage: Option<f64>,
}

/// Deserialize every row of `data`, requiring at least one.
pub fn read<T: serde::de::DeserializeOwned>(
    dataset: &'static str,
    data: &Dataset,
) -> Result<Vec<T>, ProcessError> {
    let records = data
        .deserialize()
        .map_err(|source| ProcessError::Records { dataset, source })?;
    if records.is_empty() {
        return Err(ProcessError::Empty(dataset));
    }
    Ok(records)
}
