//! National vaccination progress: daily doses, smoothing, and day-over-day change.

use crate::records::{self, ProcessError, VaccinationRecord};
use crate::stats::{pct_change, rolling_mean, round_to};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use vaxdash_core::domain::{NATIONAL_POPULATION, VACCINE_TYPES};
use vaxdash_core::Dataset;

pub const WINDOW: usize = 7;

/// One processed day of national vaccination progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VaccinationRow {
    pub date: NaiveDate,
    pub daily_first_dose: f64,
    pub cumulative_first_dose: f64,
    pub daily_second_dose: f64,
    pub cumulative_second_dose: f64,
    pub daily_booster: f64,
    pub cumulative_booster: f64,
    pub first_dose_percentage: f64,
    pub second_dose_percentage: f64,
    pub booster_percentage: f64,
    pub daily_total: f64,
    pub daily_first_dose_7d_avg: Option<f64>,
    pub daily_second_dose_7d_avg: Option<f64>,
    pub daily_booster_7d_avg: Option<f64>,
    pub daily_total_7d_avg: Option<f64>,
    pub daily_first_dose_change: Option<f64>,
    pub daily_second_dose_change: Option<f64>,
    pub daily_booster_change: Option<f64>,
    pub daily_total_change: Option<f64>,
    /// Per-vaccine columns (`{vaccine}_daily`, `{vaccine}_percentage`) present in
    /// the source. Exported after the fixed columns.
    #[serde(skip)]
    pub vaccines: BTreeMap<String, Option<f64>>,
}

/// Process the raw vaccination dataset.
///
/// Rows are sorted by date. Blank cumulative counts carry the previous day's
/// value forward. Daily counts missing from the source are derived from
/// cumulative differences (0 on the first day, never negative). Coverage
/// percentages missing from the source are computed against the national
/// population. Per-vaccine columns are carried through unchanged.
pub fn process(data: &Dataset) -> Result<Vec<VaccinationRow>, ProcessError> {
    let raw: Vec<VaccinationRecord> = records::read("vaccination", data)?;
    let mut order: Vec<usize> = (0..raw.len()).collect();
    order.sort_by_key(|&i| raw[i].date);

    let vaccine_columns = vaccine_columns(data);
    let vaccines: Vec<BTreeMap<String, Option<f64>>> = order
        .iter()
        .map(|&i| {
            vaccine_columns
                .iter()
                .map(|c| (c.clone(), data.f64(i, c)))
                .collect()
        })
        .collect();
    let records: Vec<VaccinationRecord> = order.iter().map(|&i| raw[i].clone()).collect();

    let first = series(&records, |r| r.cumulative_first_dose, |r| r.daily_first_dose);
    let second = series(&records, |r| r.cumulative_second_dose, |r| r.daily_second_dose);
    let booster = series(&records, |r| r.cumulative_booster, |r| r.daily_booster);

    let daily_total: Vec<f64> = (0..records.len())
        .map(|i| first.daily[i] + second.daily[i] + booster.daily[i])
        .collect();

    let avg = |values: &[f64]| -> Vec<Option<f64>> {
        rolling_mean(&wrap(values), WINDOW)
            .into_iter()
            .map(|v| v.map(f64::round))
            .collect()
    };
    let change = |values: &[f64]| pct_change(&wrap(values));

    let (first_avg, first_chg) = (avg(&first.daily), change(&first.daily));
    let (second_avg, second_chg) = (avg(&second.daily), change(&second.daily));
    let (booster_avg, booster_chg) = (avg(&booster.daily), change(&booster.daily));
    let (total_avg, total_chg) = (avg(&daily_total), change(&daily_total));

    let coverage = |cumulative: f64| round_to(cumulative / NATIONAL_POPULATION as f64 * 100.0, 2);

    Ok(records
        .iter()
        .enumerate()
        .map(|(i, r)| VaccinationRow {
            date: r.date,
            daily_first_dose: first.daily[i],
            cumulative_first_dose: first.cumulative[i],
            daily_second_dose: second.daily[i],
            cumulative_second_dose: second.cumulative[i],
            daily_booster: booster.daily[i],
            cumulative_booster: booster.cumulative[i],
            first_dose_percentage: r
                .first_dose_percentage
                .unwrap_or_else(|| coverage(first.cumulative[i])),
            second_dose_percentage: r
                .second_dose_percentage
                .unwrap_or_else(|| coverage(second.cumulative[i])),
            booster_percentage: r
                .booster_percentage
                .unwrap_or_else(|| coverage(booster.cumulative[i])),
            daily_total: daily_total[i],
            daily_first_dose_7d_avg: first_avg[i],
            daily_second_dose_7d_avg: second_avg[i],
            daily_booster_7d_avg: booster_avg[i],
            daily_total_7d_avg: total_avg[i],
            daily_first_dose_change: first_chg[i],
            daily_second_dose_change: second_chg[i],
            daily_booster_change: booster_chg[i],
            daily_total_change: total_chg[i],
            vaccines: vaccines[i].clone(),
        })
        .collect())
}

fn vaccine_columns(data: &Dataset) -> Vec<String> {
    VACCINE_TYPES
        .iter()
        .flat_map(|(vaccine, _)| [format!("{vaccine}_daily"), format!("{vaccine}_percentage")])
        .filter(|c| data.has_column(c))
        .collect()
}

struct DoseSeries {
    cumulative: Vec<f64>,
    daily: Vec<f64>,
}

fn series(
    records: &[VaccinationRecord],
    cumulative: impl Fn(&VaccinationRecord) -> Option<f64>,
    daily: impl Fn(&VaccinationRecord) -> Option<f64>,
) -> DoseSeries {
    let mut out = DoseSeries {
        cumulative: Vec::with_capacity(records.len()),
        daily: Vec::with_capacity(records.len()),
    };
    let mut prev: Option<f64> = None;
    for r in records {
        let cum = cumulative(r).or(prev).unwrap_or(0.0);
        let day = match (daily(r), prev) {
            (Some(d), _) => d,
            (None, Some(p)) => (cum - p).max(0.0),
            (None, None) => 0.0,
        };
        out.cumulative.push(cum);
        out.daily.push(day);
        prev = Some(cum);
    }
    out
}

fn wrap(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().copied().map(Some).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(csv: &str) -> Dataset {
        Dataset::from_csv(csv.as_bytes()).unwrap()
    }

    #[test]
    fn derives_daily_counts_from_cumulatives() {
        let data = dataset(
            "date,cumulative_first_dose,cumulative_second_dose,cumulative_booster\n\
             2021-03-03,300,50,0\n\
             2021-03-01,100,0,0\n\
             2021-03-02,,20,0\n",
        );
        let rows = process(&data).unwrap();

        let dates: Vec<String> = rows.iter().map(|r| r.date.to_string()).collect();
        assert_eq!(dates, ["2021-03-01", "2021-03-02", "2021-03-03"]);

        let first: Vec<f64> = rows.iter().map(|r| r.daily_first_dose).collect();
        assert_eq!(first, [0.0, 0.0, 200.0]);
        assert_eq!(rows[1].cumulative_first_dose, 100.0);
        assert_eq!(rows[2].daily_second_dose, 30.0);
        assert_eq!(rows[2].daily_total, 230.0);
    }

    #[test]
    fn uses_source_daily_and_percentages_when_present() {
        let data = dataset(
            "date,daily_first_dose,cumulative_first_dose,cumulative_second_dose,cumulative_booster,first_dose_percentage\n\
             2021-03-01,40,100,0,0,7.5\n",
        );
        let rows = process(&data).unwrap();
        assert_eq!(rows[0].daily_first_dose, 40.0);
        assert_eq!(rows[0].first_dose_percentage, 7.5);
        assert_eq!(rows[0].second_dose_percentage, 0.0);
    }

    #[test]
    fn coverage_uses_national_population() {
        let data = dataset(
            "date,cumulative_first_dose,cumulative_second_dose,cumulative_booster\n\
             2021-03-01,25500000,10200000,0\n",
        );
        let rows = process(&data).unwrap();
        assert_eq!(rows[0].first_dose_percentage, 50.0);
        assert_eq!(rows[0].second_dose_percentage, 20.0);
    }

    #[test]
    fn vaccine_columns_follow_their_rows() {
        let data = dataset(
            "date,cumulative_first_dose,cumulative_second_dose,cumulative_booster,Pfizer_daily,Pfizer_percentage,Moderna_daily\n\
             2021-03-02,300,0,0,90,45,\n\
             2021-03-01,100,0,0,45,45,30\n",
        );
        let rows = process(&data).unwrap();

        assert_eq!(rows[0].vaccines["Pfizer_daily"], Some(45.0));
        assert_eq!(rows[0].vaccines["Moderna_daily"], Some(30.0));
        assert_eq!(rows[1].vaccines["Pfizer_daily"], Some(90.0));
        assert_eq!(rows[1].vaccines["Moderna_daily"], None);
        assert_eq!(rows[1].vaccines["Pfizer_percentage"], Some(45.0));
        assert!(!rows[0].vaccines.contains_key("Novavax_daily"));
    }

    #[test]
    fn seven_day_average_and_change() {
        let mut csv = String::from("date,daily_first_dose,cumulative_first_dose,cumulative_second_dose,cumulative_booster\n");
        for day in 1..=8 {
            csv.push_str(&format!("2021-03-{day:02},{},0,0,0\n", day * 10));
        }
        let rows = process(&dataset(&csv)).unwrap();

        assert_eq!(rows[5].daily_first_dose_7d_avg, None);
        assert_eq!(rows[6].daily_first_dose_7d_avg, Some(40.0));
        assert_eq!(rows[7].daily_total_7d_avg, Some(50.0));
        assert_eq!(rows[0].daily_total_change, None);
        assert_eq!(rows[1].daily_first_dose_change, Some(100.0));
        assert_eq!(rows[1].daily_booster_change, None);
    }
}
