//! vaxdash pipeline: loading, processing, and export.
//!
//! This crate builds on `vaxdash-core` to provide:
//! - Loading of every configured dataset with progress callbacks
//! - Vaccination progress with 7-day averages and day-over-day change
//! - Daily case statistics joined with coverage, with lagged correlations
//! - Regional comparison against the national average
//! - Summary with staleness reporting, exported as CSV and JSON

pub mod daily_stats;
pub mod export;
pub mod loader;
pub mod records;
pub mod regional;
pub mod stats;
pub mod summary;
pub mod vaccination;

pub use daily_stats::{DailyStatsReport, DailyStatsRow};
pub use export::{save_outputs, ExportPaths};
pub use loader::{load_all, FetchProgress, LoadError, LoadedData};
pub use records::ProcessError;
pub use regional::{NationalAverage, RegionalReport, RegionalRow};
pub use summary::VaccinationSummary;
pub use vaccination::VaccinationRow;

use tracing::info;
use vaxdash_core::config::{DAILY_STATS, REGIONAL, VACCINATION};

/// Every processed table plus the summary.
#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    pub vaccination: Vec<VaccinationRow>,
    pub daily_stats: DailyStatsReport,
    pub regional: RegionalReport,
    pub summary: VaccinationSummary,
}

/// Process the three datasets of a completed load.
pub fn process(loaded: &LoadedData) -> Result<Processed, ProcessError> {
    let dataset = |name: &'static str| {
        loaded
            .get(name)
            .map(|o| &o.dataset)
            .ok_or(ProcessError::NotLoaded(name))
    };

    let vaccination = vaccination::process(dataset(VACCINATION)?)?;
    let daily_stats = daily_stats::process(dataset(DAILY_STATS)?, &vaccination)?;
    let regional = regional::process(dataset(REGIONAL)?)?;
    let summary = summary::summarize(
        &vaccination,
        &regional.rows,
        loaded.stale_sources(),
        loaded.origins(),
    )?;

    info!(
        report_date = %summary.report_date,
        first_dose_pct = summary.first_dose_percentage,
        stale = summary.stale_sources.len(),
        "processing complete"
    );

    Ok(Processed {
        vaccination,
        daily_stats,
        regional,
        summary,
    })
}
