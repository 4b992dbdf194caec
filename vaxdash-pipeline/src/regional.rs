//! Regional coverage compared against the national average.

use crate::records::{self, ProcessError, RegionalRecord};
use crate::stats::{rank_descending, round_to};
use serde::Serialize;
use vaxdash_core::domain::region_order;
use vaxdash_core::Dataset;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionalRow {
    pub region: String,
    pub population: f64,
    pub first_dose: f64,
    pub second_dose: f64,
    pub booster: f64,
    pub first_dose_percentage: f64,
    pub second_dose_percentage: f64,
    pub booster_percentage: f64,
    pub first_dose_percentage_diff_from_avg: f64,
    pub second_dose_percentage_diff_from_avg: f64,
    pub booster_percentage_diff_from_avg: f64,
    /// Doses administered per resident.
    pub vaccination_efficiency: f64,
    pub first_dose_percentage_rank: u32,
    pub second_dose_percentage_rank: u32,
    pub booster_percentage_rank: u32,
}

/// National coverage computed from regional sums.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NationalAverage {
    pub first_dose_percentage: f64,
    pub second_dose_percentage: f64,
    pub booster_percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionalReport {
    /// In reporting order; unrecognized regions follow in input order.
    pub rows: Vec<RegionalRow>,
    pub national: NationalAverage,
}

pub fn process(data: &Dataset) -> Result<RegionalReport, ProcessError> {
    let mut records: Vec<RegionalRecord> = records::read("regional", data)?;
    if let Some(r) = records.iter().find(|r| !(r.population > 0.0)) {
        return Err(ProcessError::Invalid {
            dataset: "regional",
            reason: format!("region '{}' has non-positive population", r.region),
        });
    }
    records.sort_by_key(|r| region_order(&r.region).unwrap_or(usize::MAX));

    let population: f64 = records.iter().map(|r| r.population).sum();
    let national = NationalAverage {
        first_dose_percentage: records.iter().map(|r| r.first_dose).sum::<f64>() / population * 100.0,
        second_dose_percentage: records.iter().map(|r| r.second_dose).sum::<f64>() / population * 100.0,
        booster_percentage: records.iter().map(|r| r.booster).sum::<f64>() / population * 100.0,
    };

    let pct = |given: Option<f64>, doses: f64, population: f64| {
        given.unwrap_or_else(|| round_to(doses / population * 100.0, 2))
    };
    let first: Vec<f64> = records
        .iter()
        .map(|r| pct(r.first_dose_percentage, r.first_dose, r.population))
        .collect();
    let second: Vec<f64> = records
        .iter()
        .map(|r| pct(r.second_dose_percentage, r.second_dose, r.population))
        .collect();
    let booster: Vec<f64> = records
        .iter()
        .map(|r| pct(r.booster_percentage, r.booster, r.population))
        .collect();

    let (first_rank, second_rank, booster_rank) = (
        rank_descending(&first),
        rank_descending(&second),
        rank_descending(&booster),
    );

    let rows = records
        .into_iter()
        .enumerate()
        .map(|(i, r)| RegionalRow {
            vaccination_efficiency: (r.first_dose + r.second_dose + r.booster) / r.population,
            region: r.region,
            population: r.population,
            first_dose: r.first_dose,
            second_dose: r.second_dose,
            booster: r.booster,
            first_dose_percentage: first[i],
            second_dose_percentage: second[i],
            booster_percentage: booster[i],
            first_dose_percentage_diff_from_avg: first[i] - national.first_dose_percentage,
            second_dose_percentage_diff_from_avg: second[i] - national.second_dose_percentage,
            booster_percentage_diff_from_avg: booster[i] - national.booster_percentage,
            first_dose_percentage_rank: first_rank[i],
            second_dose_percentage_rank: second_rank[i],
            booster_percentage_rank: booster_rank[i],
        })
        .collect();

    Ok(RegionalReport { rows, national })
}
