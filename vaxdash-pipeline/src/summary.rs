//! Headline figures for the latest reporting day.

use crate::records::ProcessError;
use crate::regional::RegionalRow;
use crate::stats::round_to;
use crate::vaccination::VaccinationRow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaccinationSummary {
    pub report_date: NaiveDate,
    pub first_dose_percentage: f64,
    pub second_dose_percentage: f64,
    pub booster_percentage: f64,
    /// 7-day average of total daily doses on the report date.
    pub daily_vaccinations_last_week: Option<u64>,
    /// Day-over-day change in total daily doses on the report date.
    pub weekly_change_percentage: Option<f64>,
    pub top_region: String,
    pub bottom_region: String,
    /// Spread between the highest and lowest regional first-dose coverage.
    pub regional_variation: f64,
    /// Datasets served from cache because every live source failed.
    pub stale_sources: Vec<String>,
    /// Where each dataset came from, e.g. `live (owid)` or `cache (2024-01-05 09:30)`.
    pub origins: BTreeMap<String, String>,
}

/// Build the summary. Coverage comes from regional sums; the report date and
/// dose rates come from the last vaccination row.
pub fn summarize(
    vaccination: &[VaccinationRow],
    regional: &[RegionalRow],
    stale_sources: Vec<String>,
    origins: BTreeMap<String, String>,
) -> Result<VaccinationSummary, ProcessError> {
    let latest = vaccination
        .iter()
        .max_by_key(|r| r.date)
        .ok_or(ProcessError::Empty("vaccination"))?;
    let first_region = regional.first().ok_or(ProcessError::Empty("regional"))?;

    let population: f64 = regional.iter().map(|r| r.population).sum();
    let coverage = |doses: f64| round_to(doses / population * 100.0, 2);

    // First occurrence wins on ties.
    let mut top = first_region;
    let mut bottom = first_region;
    for row in regional {
        if row.first_dose_percentage > top.first_dose_percentage {
            top = row;
        }
        if row.first_dose_percentage < bottom.first_dose_percentage {
            bottom = row;
        }
    }

    Ok(VaccinationSummary {
        report_date: latest.date,
        first_dose_percentage: coverage(regional.iter().map(|r| r.first_dose).sum()),
        second_dose_percentage: coverage(regional.iter().map(|r| r.second_dose).sum()),
        booster_percentage: coverage(regional.iter().map(|r| r.booster).sum()),
        daily_vaccinations_last_week: latest.daily_total_7d_avg.map(|v| v.max(0.0) as u64),
        weekly_change_percentage: latest.daily_total_change.map(|v| round_to(v, 2)),
        top_region: top.region.clone(),
        bottom_region: bottom.region.clone(),
        regional_variation: round_to(
            top.first_dose_percentage - bottom.first_dose_percentage,
            2,
        ),
        stale_sources,
        origins,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaxdash_core::Dataset;

    fn regional() -> Vec<RegionalRow> {
        let data = Dataset::from_csv(
            "region,population,first_dose,second_dose,booster\n\
             Seoul,100,90,80,50\n\
             Busan,100,70,60,30\n\
             Jeju,200,170,150,100\n"
                .as_bytes(),
        )
        .unwrap();
        crate::regional::process(&data).unwrap().rows
    }

    fn vaccination() -> Vec<VaccinationRow> {
        let mut csv = String::from(
            "date,daily_first_dose,cumulative_first_dose,cumulative_second_dose,cumulative_booster\n",
        );
        for day in 1..=8 {
            csv.push_str(&format!("2022-02-{day:02},{},0,0,0\n", day * 100));
        }
        crate::vaccination::process(&Dataset::from_csv(csv.as_bytes()).unwrap()).unwrap()
    }

    #[test]
    fn headline_figures() {
        let summary = summarize(&vaccination(), &regional(), vec![], BTreeMap::new()).unwrap();

        assert_eq!(summary.report_date.to_string(), "2022-02-08");
        assert_eq!(summary.first_dose_percentage, 82.5);
        assert_eq!(summary.second_dose_percentage, 72.5);
        assert_eq!(summary.booster_percentage, 45.0);
        assert_eq!(summary.daily_vaccinations_last_week, Some(500));
        assert_eq!(summary.weekly_change_percentage, Some(14.29));
        assert_eq!(summary.top_region, "Seoul");
        assert_eq!(summary.bottom_region, "Busan");
        assert_eq!(summary.regional_variation, 20.0);
    }

    #[test]
    fn carries_stale_sources() {
        let summary = summarize(
            &vaccination(),
            &regional(),
            vec!["regional".into()],
            BTreeMap::from([("regional".to_string(), "cache".to_string())]),
        )
        .unwrap();
        assert_eq!(summary.stale_sources, ["regional"]);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["report_date"], "2022-02-08");
        assert_eq!(json["stale_sources"][0], "regional");
    }

    #[test]
    fn short_history_has_no_weekly_average() {
        let data = Dataset::from_csv(
            "date,cumulative_first_dose,cumulative_second_dose,cumulative_booster\n2022-02-01,10,0,0\n"
                .as_bytes(),
        )
        .unwrap();
        let rows = crate::vaccination::process(&data).unwrap();
        let summary = summarize(&rows, &regional(), vec![], BTreeMap::new()).unwrap();
        assert_eq!(summary.daily_vaccinations_last_week, None);
        assert_eq!(summary.weekly_change_percentage, None);
    }

    #[test]
    fn empty_inputs_are_errors() {
        assert!(summarize(&[], &regional(), vec![], BTreeMap::new()).is_err());
        assert!(summarize(&vaccination(), &[], vec![], BTreeMap::new()).is_err());
    }
}
