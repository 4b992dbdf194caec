//! vaxdash CLI: fetch, process, and cache management commands.
//!
//! Commands:
//! - `run`: fetch every dataset, process it, and export CSV/JSON outputs
//! - `fetch`: fetch a single dataset and report where it came from
//! - `cache status`: report what is cached, from which source, and when
//! - `cache clean`: remove cache entries older than a given age

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use vaxdash_core::data::{
    AggregateFetchError, AttemptOutcome, CsvCache, DefaultTransport, FetchOutcome, Fetcher,
    HttpTransport,
};
use vaxdash_core::FetchConfig;
use vaxdash_pipeline::{load_all, process, save_outputs, FetchProgress, LoadError, Processed};

#[derive(Parser)]
#[command(
    name = "vaxdash",
    version,
    about = "vaxdash: South Korea COVID-19 vaccination data with multi-source fallback"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that reads the configuration.
#[derive(clap::Args)]
struct ConfigArgs {
    /// TOML config file. Defaults to the built-in KDCA/OWID/simulated sources.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Cache directory (overrides the config file).
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch all datasets, process them, and export the results.
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        /// Output directory (overrides the config file).
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Ignore a cache-only configuration and always try live sources.
        #[arg(long, default_value_t = false)]
        refresh: bool,

        /// Retries per source after the first attempt.
        #[arg(long)]
        retry: Option<u32>,

        /// Print the summary path only, without a file:// link.
        #[arg(long, default_value_t = false)]
        no_browser: bool,
    },
    /// Fetch one dataset and report the attempts made.
    Fetch {
        /// Dataset name (vaccination, daily_stats, regional, or one from --config).
        dataset: String,

        #[command(flatten)]
        config: ConfigArgs,

        /// Ignore a cache-only configuration and always try live sources.
        #[arg(long, default_value_t = false)]
        refresh: bool,

        /// Retries per source after the first attempt.
        #[arg(long)]
        retry: Option<u32>,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report cached datasets, their source, row count, and age.
    Status {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Remove cached datasets.
    Clean {
        #[command(flatten)]
        config: ConfigArgs,

        /// Only remove entries cached more than this many days ago.
        #[arg(long)]
        older_than_days: Option<u64>,

        /// Actually delete (without this flag, only previews what would be removed).
        #[arg(long, default_value_t = false)]
        confirm: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            config,
            output_dir,
            refresh,
            retry,
            no_browser,
        } => run_pipeline(&config, output_dir, refresh, retry, no_browser),
        Commands::Fetch {
            dataset,
            config,
            refresh,
            retry,
        } => run_fetch(&dataset, &config, refresh, retry),
        Commands::Cache { action } => match action {
            CacheAction::Status { config } => run_cache_status(&config),
            CacheAction::Clean {
                config,
                older_than_days,
                confirm,
            } => run_cache_clean(&config, older_than_days, confirm),
        },
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn load_config(args: &ConfigArgs, retry: Option<u32>) -> Result<FetchConfig> {
    let mut config = match &args.config {
        Some(path) => FetchConfig::from_file(path)?,
        None => FetchConfig::default_korea(),
    };
    if let Some(dir) = &args.cache_dir {
        config.cache_dir = dir.clone();
    }
    if let Some(retries) = retry {
        config = config.with_retries(retries);
    }
    debug!(
        cache_dir = %config.cache_dir.display(),
        retries = config.retries,
        datasets = config.datasets.len(),
        "configuration loaded"
    );
    Ok(config)
}

fn build_transport(config: &FetchConfig) -> Result<DefaultTransport> {
    let http = HttpTransport::new(config.timeout(), &config.user_agent)
        .context("failed to set up HTTP transport")?;
    Ok(DefaultTransport::new(http))
}

/// Prints one line per dataset as it is fetched.
struct StdoutProgress;

impl FetchProgress for StdoutProgress {
    fn on_start(&self, dataset: &str, index: usize, total: usize) {
        println!("[{}/{}] Fetching {dataset}...", index + 1, total);
    }

    fn on_complete(
        &self,
        dataset: &str,
        _index: usize,
        _total: usize,
        result: &Result<FetchOutcome, AggregateFetchError>,
    ) {
        match result {
            Ok(outcome) if outcome.is_stale => println!(
                "  {dataset}: {} rows from {} (STALE: all live sources failed)",
                outcome.dataset.len(),
                outcome.origin
            ),
            Ok(outcome) => println!(
                "  {dataset}: {} rows from {}",
                outcome.dataset.len(),
                outcome.origin
            ),
            Err(_) => println!("  {dataset}: FAILED"),
        }
    }
}

fn run_pipeline(
    args: &ConfigArgs,
    output_dir: Option<PathBuf>,
    refresh: bool,
    retry: Option<u32>,
    no_browser: bool,
) -> Result<()> {
    let mut config = load_config(args, retry)?;
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }

    let cache = CsvCache::new(&config.cache_dir);
    let transport = build_transport(&config)?;
    let fetcher = Fetcher::new(&transport, &cache, config.retry_policy());

    let loaded = match load_all(&config, &fetcher, refresh, Some(&StdoutProgress)) {
        Ok(loaded) => loaded,
        Err(LoadError::Unavailable(failures)) => {
            for failure in &failures {
                report_failure(failure);
            }
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let processed = process(&loaded)?;
    let paths = save_outputs(&processed, &config.output_dir)?;

    print_summary(&processed);
    println!();
    println!("Processed data saved to: {}", config.output_dir.display());
    if no_browser {
        println!("Summary: {}", paths.summary.display());
    } else {
        println!("Open the summary: {}", file_url(&paths.summary));
    }

    Ok(())
}

fn run_fetch(dataset: &str, args: &ConfigArgs, refresh: bool, retry: Option<u32>) -> Result<()> {
    let config = load_config(args, retry)?;
    let sources = config.dataset(dataset)?;

    let cache = CsvCache::new(&config.cache_dir);
    let transport = build_transport(&config)?;
    let fetcher = Fetcher::new(&transport, &cache, config.retry_policy());

    let outcome = match fetcher.fetch(&sources, refresh) {
        Ok(outcome) => outcome,
        Err(e) => {
            report_failure(&e);
            std::process::exit(1);
        }
    };

    println!("Dataset:  {}", outcome.dataset_name);
    println!("Origin:   {}", outcome.origin);
    println!("Rows:     {}", outcome.dataset.len());
    println!("Columns:  {}", outcome.dataset.columns().join(", "));
    if outcome.is_stale {
        println!("WARNING: served from cache, all live sources failed");
    }
    if !outcome.attempts.is_empty() {
        println!();
        println!("{:<12} {:>7}  Result", "Source", "Attempt");
        println!("{}", "-".repeat(60));
        for a in &outcome.attempts {
            let result = match &a.outcome {
                AttemptOutcome::Success { rows } => format!("ok ({rows} rows)"),
                AttemptOutcome::Failure { kind, message } => format!("{kind}: {message}"),
            };
            println!("{:<12} {:>7}  {result}", a.source, a.attempt);
        }
    }
    Ok(())
}

fn report_failure(e: &AggregateFetchError) {
    eprintln!("Error: no data for '{}'", e.dataset);
    if e.failures.is_empty() {
        eprintln!("  (all sources disabled)");
    }
    for failure in &e.failures {
        eprintln!("  {failure}");
    }
    eprintln!("  cache: {}", e.cache);
}

fn run_cache_status(args: &ConfigArgs) -> Result<()> {
    let config = load_config(args, None)?;
    let cache = CsvCache::new(&config.cache_dir);

    if !cache.cache_dir().exists() {
        println!("Cache directory does not exist: {}", cache.cache_dir().display());
        return Ok(());
    }

    let statuses = cache.status(&config.dataset_names());
    let total_size: u64 = statuses.iter().map(|s| s.size_bytes).sum();

    println!("Cache: {}", cache.cache_dir().display());
    println!("Total size: {}", format_size(total_size));
    println!();
    println!(
        "{:<14} {:<12} {:>8} {:<18} {:>10}",
        "Dataset", "Source", "Rows", "Cached At", "Size"
    );
    println!("{}", "-".repeat(66));
    for s in &statuses {
        if !s.cached {
            println!("{:<14} (not cached)", s.dataset);
            continue;
        }
        println!(
            "{:<14} {:<12} {:>8} {:<18} {:>10}",
            s.dataset,
            s.source.as_deref().unwrap_or("(no meta)"),
            s.row_count.map(|n| n.to_string()).unwrap_or_default(),
            s.cached_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default(),
            format_size(s.size_bytes)
        );
    }
    Ok(())
}

fn run_cache_clean(args: &ConfigArgs, older_than_days: Option<u64>, confirm: bool) -> Result<()> {
    let config = load_config(args, None)?;
    let cache = CsvCache::new(&config.cache_dir);

    let cutoff = older_than_days
        .map(|days| clean_cutoff(chrono::Local::now().naive_local(), days))
        .transpose()?;
    let to_remove: Vec<_> = cache
        .entries()?
        .into_iter()
        .filter(|meta| cutoff.map_or(true, |c| meta.cached_at < c))
        .collect();

    if to_remove.is_empty() {
        match older_than_days {
            Some(days) => println!("No cache entries older than {days} days to remove."),
            None => println!("Cache is empty: {}", cache.cache_dir().display()),
        }
        return Ok(());
    }

    println!("Found {} cache entr(ies) to remove:", to_remove.len());
    for meta in &to_remove {
        println!(
            "  {} ({} rows from {}, cached {})",
            meta.dataset,
            meta.row_count,
            meta.source,
            meta.cached_at.format("%Y-%m-%d %H:%M")
        );
    }

    if !confirm {
        println!();
        println!("Dry run. Pass --confirm to actually delete.");
        return Ok(());
    }

    for meta in &to_remove {
        cache.remove(&meta.dataset)?;
        println!("Removed: {}", meta.dataset);
    }
    println!("Done. Removed {} entr(ies).", to_remove.len());
    Ok(())
}

/// `now` minus `days`, or an error when that falls outside the calendar.
fn clean_cutoff(now: NaiveDateTime, days: u64) -> Result<NaiveDateTime> {
    i64::try_from(days)
        .ok()
        .and_then(chrono::Duration::try_days)
        .and_then(|age| now.checked_sub_signed(age))
        .with_context(|| format!("--older-than-days {days} is out of range"))
}

fn print_summary(processed: &Processed) {
    let s = &processed.summary;
    println!();
    println!("=== Vaccination Summary ===");
    println!("Report date:      {}", s.report_date);
    println!("First dose:       {:.2}%", s.first_dose_percentage);
    println!("Second dose:      {:.2}%", s.second_dose_percentage);
    println!("Booster:          {:.2}%", s.booster_percentage);
    if let Some(avg) = s.daily_vaccinations_last_week {
        println!("7-day avg doses:  {avg}");
    }
    if let Some(change) = s.weekly_change_percentage {
        println!("Daily change:     {change:+.2}%");
    }
    println!(
        "Regions:          top {}, bottom {} (spread {:.2} pts)",
        s.top_region, s.bottom_region, s.regional_variation
    );
    if let Some(r) = processed.daily_stats.first_dose_case_correlation {
        println!("Coverage vs. cases (14d lag): r = {r:.3}");
    }
    if !s.stale_sources.is_empty() {
        println!();
        println!(
            "WARNING: stale data (served from cache): {}",
            s.stale_sources.join(", ")
        );
    }
}

fn file_url(path: &Path) -> String {
    let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", absolute.display())
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
