//! Simulated feeds for offline development and last-resort fallback.
//!
//! Each feed covers one year ending at a given date and is fully determined
//! by `(feed, seed, end)`. The output has the same columns as the live
//! sources' canonical schema so it flows through the normal parse path.

use super::provider::SyntheticFeed;
use crate::dataset::{Dataset, DatasetError};
use crate::domain::{NATIONAL_POPULATION, REGIONS, VACCINE_TYPES};
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DAYS: i64 = 365;
const SECOND_DOSE_LAG: i64 = 28;
const BOOSTER_LAG: i64 = 180;

pub fn generate(feed: SyntheticFeed, seed: u64, end: NaiveDate) -> Result<Dataset, DatasetError> {
    let mut rng = feed_rng(feed, seed);
    match feed {
        SyntheticFeed::Vaccination => vaccination(end),
        SyntheticFeed::DailyStats => daily_stats(&mut rng, end),
        SyntheticFeed::Regional => regional(&mut rng),
    }
}

/// Deterministic RNG per (feed, seed).
fn feed_rng(feed: SyntheticFeed, seed: u64) -> StdRng {
    let mut hasher = blake3::Hasher::new();
    hasher.update(feed.name().as_bytes());
    hasher.update(&seed.to_le_bytes());
    StdRng::from_seed(*hasher.finalize().as_bytes())
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

fn logistic(day: i64) -> f64 {
    1.0 / (1.0 + (-0.015 * (day as f64 - 120.0)).exp())
}

fn vaccination(end: NaiveDate) -> Result<Dataset, DatasetError> {
    let start = end - Duration::days(DAYS);
    let population = NATIONAL_POPULATION as f64;
    let first_dose_max = 0.85 * population;

    let mut columns: Vec<String> = [
        "date",
        "daily_first_dose",
        "cumulative_first_dose",
        "daily_second_dose",
        "cumulative_second_dose",
        "daily_booster",
        "cumulative_booster",
        "first_dose_percentage",
        "second_dose_percentage",
        "booster_percentage",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();
    for (vaccine, _) in VACCINE_TYPES {
        columns.push(format!("{vaccine}_daily"));
        columns.push(format!("{vaccine}_percentage"));
    }

    let mut rows = Vec::with_capacity(DAYS as usize + 1);
    let (mut cum_first, mut cum_second, mut cum_booster) = (0u64, 0u64, 0u64);

    for day in 0..=DAYS {
        let date = start + Duration::days(day);

        let first_target = (first_dose_max * logistic(day)) as u64;
        let second_target = if day >= SECOND_DOSE_LAG {
            (first_dose_max * logistic(day - SECOND_DOSE_LAG)) as u64
        } else {
            0
        };
        // Seventy percent of fully vaccinated people take a booster.
        let booster_target = if day >= SECOND_DOSE_LAG + BOOSTER_LAG {
            let t = (first_dose_max * logistic(day - SECOND_DOSE_LAG - BOOSTER_LAG)) as u64;
            t.min((second_target as f64 * 0.7) as u64)
        } else {
            0
        };

        let daily_first = first_target.saturating_sub(cum_first);
        let daily_second = second_target.saturating_sub(cum_second);
        let daily_booster = booster_target.saturating_sub(cum_booster);
        cum_first += daily_first;
        cum_second += daily_second;
        cum_booster += daily_booster;

        let mut row = vec![
            date.format("%Y-%m-%d").to_string(),
            daily_first.to_string(),
            cum_first.to_string(),
            daily_second.to_string(),
            cum_second.to_string(),
            daily_booster.to_string(),
            cum_booster.to_string(),
            round2(cum_first as f64 / population * 100.0).to_string(),
            round2(cum_second as f64 / population * 100.0).to_string(),
            round2(cum_booster as f64 / population * 100.0).to_string(),
        ];
        let total_daily = (daily_first + daily_second + daily_booster) as f64;
        for (_, share) in VACCINE_TYPES {
            row.push(((total_daily * share) as u64).to_string());
            row.push(round2(share * 100.0).to_string());
        }
        rows.push(row);
    }

    Dataset::new(columns, rows)
}

fn daily_stats(rng: &mut StdRng, end: NaiveDate) -> Result<Dataset, DatasetError> {
    let start = end - Duration::days(DAYS);
    let columns = ["date", "daily_cases", "daily_deaths", "daily_tests", "positivity_rate"]
        .iter()
        .map(|c| c.to_string())
        .collect();

    let mut rows = Vec::with_capacity(DAYS as usize + 1);
    for day in 0..=DAYS {
        let date = start + Duration::days(day);

        // 90-day wave, damped once vaccination has been underway for a while.
        let trend = (2.0 * std::f64::consts::PI * day as f64 / 90.0).sin();
        let damping = (1.0 - (day - 120).max(0) as f64 / 300.0).max(0.0);

        let cases = ((2000.0 + 1500.0 * trend) * damping * (1.0 + rng.gen_range(-0.2f64..0.2)))
            .max(100.0) as u64;
        let deaths = ((20.0 + 15.0 * trend) * damping * (1.0 + rng.gen_range(-0.3f64..0.3)))
            .max(0.0) as u64;
        let tests = (100_000.0 * (1.0 + rng.gen_range(-0.1f64..0.1))).max(10_000.0) as u64;

        rows.push(vec![
            date.format("%Y-%m-%d").to_string(),
            cases.to_string(),
            deaths.to_string(),
            tests.to_string(),
            round2(cases as f64 / tests as f64 * 100.0).to_string(),
        ]);
    }

    Dataset::new(columns, rows)
}

fn regional(rng: &mut StdRng) -> Result<Dataset, DatasetError> {
    let columns = [
        "region",
        "population",
        "first_dose",
        "second_dose",
        "booster",
        "first_dose_percentage",
        "second_dose_percentage",
        "booster_percentage",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();

    let mut rows = Vec::with_capacity(REGIONS.len());
    for (region, share) in REGIONS {
        let population = (NATIONAL_POPULATION as f64 * share) as u64;
        let variation = 1.0 + rng.gen_range(-0.1f64..0.1);

        let booster = (population as f64 * 0.50 * variation) as u64;
        let second = ((population as f64 * 0.80 * variation) as u64).max(booster);
        let first = ((population as f64 * 0.85 * variation) as u64).max(second);
        let pct = |n: u64| round2(n as f64 / population as f64 * 100.0).to_string();

        rows.push(vec![
            region.to_string(),
            population.to_string(),
            first.to_string(),
            second.to_string(),
            booster.to_string(),
            pct(first),
            pct(second),
            pct(booster),
        ]);
    }

    Dataset::new(columns, rows)
}
