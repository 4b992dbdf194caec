//! Daily case statistics joined with vaccination coverage.

use crate::records::{self, DailyStatsRecord, ProcessError};
use crate::stats::{pearson, rolling_mean, round_to};
use crate::vaccination::{VaccinationRow, WINDOW};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use vaxdash_core::Dataset;

/// Days between a coverage reading and the case count it is compared with.
pub const CORRELATION_LAG_DAYS: usize = 14;

/// Correlations need strictly more usable points than this.
pub const MIN_CORRELATION_POINTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyStatsRow {
    pub date: NaiveDate,
    pub daily_cases: f64,
    pub daily_deaths: f64,
    pub daily_tests: Option<f64>,
    pub positivity_rate: Option<f64>,
    pub daily_cases_7d_avg: Option<f64>,
    pub daily_deaths_7d_avg: Option<f64>,
    pub positivity_rate_7d_avg: Option<f64>,
    pub first_dose_percentage: f64,
    pub second_dose_percentage: f64,
    pub booster_percentage: f64,
    pub first_dose_case_correlation: Option<f64>,
    pub second_dose_case_correlation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyStatsReport {
    pub rows: Vec<DailyStatsRow>,
    /// Coverage vs. cases `CORRELATION_LAG_DAYS` later.
    pub first_dose_case_correlation: Option<f64>,
    pub second_dose_case_correlation: Option<f64>,
}

pub fn process(
    data: &Dataset,
    vaccination: &[VaccinationRow],
) -> Result<DailyStatsReport, ProcessError> {
    let mut records: Vec<DailyStatsRecord> = records::read("daily_stats", data)?;
    records.sort_by_key(|r| r.date);

    let coverage: HashMap<NaiveDate, &VaccinationRow> =
        vaccination.iter().map(|v| (v.date, v)).collect();

    let cases: Vec<Option<f64>> = records.iter().map(|r| Some(r.daily_cases)).collect();
    let deaths: Vec<Option<f64>> = records.iter().map(|r| Some(r.daily_deaths)).collect();
    let positivity: Vec<Option<f64>> = records.iter().map(|r| r.positivity_rate).collect();

    let cases_avg = rolling_mean(&cases, WINDOW);
    let deaths_avg = rolling_mean(&deaths, WINDOW);
    let positivity_avg = rolling_mean(&positivity, WINDOW);

    let mut rows: Vec<DailyStatsRow> = records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let vax = coverage.get(&r.date);
            DailyStatsRow {
                date: r.date,
                daily_cases: r.daily_cases,
                daily_deaths: r.daily_deaths,
                daily_tests: r.daily_tests,
                positivity_rate: r.positivity_rate,
                daily_cases_7d_avg: cases_avg[i].map(f64::round),
                daily_deaths_7d_avg: deaths_avg[i].map(f64::round),
                positivity_rate_7d_avg: positivity_avg[i].map(|v| round_to(v, 2)),
                first_dose_percentage: vax.map_or(0.0, |v| v.first_dose_percentage),
                second_dose_percentage: vax.map_or(0.0, |v| v.second_dose_percentage),
                booster_percentage: vax.map_or(0.0, |v| v.booster_percentage),
                first_dose_case_correlation: None,
                second_dose_case_correlation: None,
            }
        })
        .collect();

    let first = lagged_correlation(&rows, |r| r.first_dose_percentage);
    let second = lagged_correlation(&rows, |r| r.second_dose_percentage);
    for row in &mut rows {
        row.first_dose_case_correlation = first;
        row.second_dose_case_correlation = second;
    }

    Ok(DailyStatsReport {
        rows,
        first_dose_case_correlation: first,
        second_dose_case_correlation: second,
    })
}

/// Correlate coverage on day `t` with cases on day `t + lag`, over days with
/// non-zero coverage.
fn lagged_correlation(rows: &[DailyStatsRow], coverage: impl Fn(&DailyStatsRow) -> f64) -> Option<f64> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = rows
        .iter()
        .zip(rows.iter().skip(CORRELATION_LAG_DAYS))
        .map(|(now, later)| (coverage(now), later.daily_cases))
        .filter(|(pct, _)| *pct > 0.0)
        .unzip();
    if xs.len() <= MIN_CORRELATION_POINTS {
        return None;
    }
    pearson(&xs, &ys)
}
