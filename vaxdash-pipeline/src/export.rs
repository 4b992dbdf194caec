//! Export of processed tables and the summary.
//!
//! Writes into the output directory:
//! - `processed_vaccination_data.csv`
//! - `processed_daily_stats.csv`
//! - `processed_regional_data.csv`
//! - `vaccination_summary.json`
//!
//! Missing values are written as empty CSV cells and JSON `null`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use vaxdash_core::Dataset;

use crate::summary::VaccinationSummary;
use crate::vaccination::VaccinationRow;
use crate::Processed;

pub const VACCINATION_FILE: &str = "processed_vaccination_data.csv";
pub const DAILY_STATS_FILE: &str = "processed_daily_stats.csv";
pub const REGIONAL_FILE: &str = "processed_regional_data.csv";
pub const SUMMARY_FILE: &str = "vaccination_summary.json";

/// Paths of the files written by [`save_outputs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub vaccination: PathBuf,
    pub daily_stats: PathBuf,
    pub regional: PathBuf,
    pub summary: PathBuf,
}

/// Serialize rows as CSV with a header taken from the field names.
pub fn to_csv<T: Serialize>(rows: &[T]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in rows {
        wtr.serialize(row)?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Vaccination rows with the per-vaccine columns appended, in name order.
pub fn vaccination_csv(rows: &[VaccinationRow]) -> Result<String> {
    let base = Dataset::from_records(rows).context("failed to serialize vaccination rows")?;
    let vaccines: BTreeSet<&str> = rows
        .iter()
        .flat_map(|r| r.vaccines.keys().map(String::as_str))
        .collect();
    if vaccines.is_empty() {
        return to_csv(rows);
    }

    let mut columns = base.columns().to_vec();
    columns.extend(vaccines.iter().map(|c| c.to_string()));
    let cells = base
        .rows()
        .iter()
        .zip(rows)
        .map(|(cells, row)| {
            let mut cells = cells.clone();
            cells.extend(vaccines.iter().map(|c| match row.vaccines.get(*c) {
                Some(Some(v)) => v.to_string(),
                _ => String::new(),
            }));
            cells
        })
        .collect();

    let bytes = Dataset::new(columns, cells)
        .and_then(|d| d.to_csv_bytes())
        .context("failed to write vaccination CSV")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

pub fn summary_json(summary: &VaccinationSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).context("failed to serialize summary to JSON")
}

/// Read a summary written by [`save_outputs`].
pub fn load_summary(path: &Path) -> Result<VaccinationSummary> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("failed to parse {}", path.display()))
}

/// Write every processed table plus the summary into `output_dir`.
pub fn save_outputs(processed: &Processed, output_dir: &Path) -> Result<ExportPaths> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;

    let paths = ExportPaths {
        vaccination: output_dir.join(VACCINATION_FILE),
        daily_stats: output_dir.join(DAILY_STATS_FILE),
        regional: output_dir.join(REGIONAL_FILE),
        summary: output_dir.join(SUMMARY_FILE),
    };

    write(&paths.vaccination, &vaccination_csv(&processed.vaccination)?)?;
    write(&paths.daily_stats, &to_csv(&processed.daily_stats.rows)?)?;
    write(&paths.regional, &to_csv(&processed.regional.rows)?)?;
    write(&paths.summary, &summary_json(&processed.summary)?)?;

    Ok(paths)
}

fn write(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
