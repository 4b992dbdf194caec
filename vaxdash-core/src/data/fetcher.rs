//! Multi-source fetch with per-source retry, priority fallback, and cache.
//!
//! Sources are tried one at a time in ascending priority order. Transient
//! failures are retried against the same source with backoff; anything else
//! moves on to the next source. When every source has failed, the last cached
//! copy of the dataset is served and marked stale. Only when the cache is
//! missing or unreadable too does the fetch fail, with one entry per source.

use super::backoff::{RetryPolicy, Sleeper, ThreadSleeper};
use super::cache::{CacheError, CsvCache};
use super::provider::{FailureKind, FetchError, Transport};
use super::source::{SourceDescriptor, SourceSet};
use crate::dataset::Dataset;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

static THREAD_SLEEPER: ThreadSleeper = ThreadSleeper;

/// Result of one attempt against one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchAttemptResult {
    pub source: String,
    /// 1-based.
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success { rows: usize },
    Failure { kind: FailureKind, message: String },
}

/// Where the returned dataset came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataOrigin {
    Live {
        source: String,
    },
    Cache {
        cached_at: Option<NaiveDateTime>,
        /// Source that produced the cached copy, when the sidecar records it.
        source: Option<String>,
    },
}

impl fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataOrigin::Live { source } => write!(f, "live ({source})"),
            DataOrigin::Cache {
                cached_at: Some(at),
                ..
            } => write!(f, "cache ({})", at.format("%Y-%m-%d %H:%M")),
            DataOrigin::Cache { cached_at: None, .. } => f.write_str("cache"),
        }
    }
}

/// A dataset plus how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub dataset_name: String,
    pub dataset: Dataset,
    /// True when served from cache because no live source succeeded.
    pub is_stale: bool,
    pub origin: DataOrigin,
    /// Every attempt made during this fetch, in order.
    pub attempts: Vec<FetchAttemptResult>,
}

impl FetchOutcome {
    /// Number of attempts made against `source`.
    pub fn attempts_for(&self, source: &str) -> usize {
        self.attempts.iter().filter(|a| a.source == source).count()
    }
}

/// Final failure of one source after its retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source: String,
    pub attempts: u32,
    pub error: FetchError,
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} after {} attempt(s): {}",
            self.source,
            self.error.kind(),
            self.attempts,
            self.error
        )
    }
}

/// Every source failed and the cache could not stand in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("all sources failed for '{dataset}' ({} attempted) and no usable cache: {cache}", .failures.len())]
pub struct AggregateFetchError {
    pub dataset: String,
    /// One entry per attempted source, in priority order.
    pub failures: Vec<SourceFailure>,
    pub cache: CacheError,
}

/// Drives a `SourceSet` through a transport with retry and cache fallback.
pub struct Fetcher<'a> {
    transport: &'a dyn Transport,
    cache: &'a CsvCache,
    sleeper: &'a dyn Sleeper,
    policy: RetryPolicy,
}

impl<'a> Fetcher<'a> {
    pub fn new(transport: &'a dyn Transport, cache: &'a CsvCache, policy: RetryPolicy) -> Self {
        Self {
            transport,
            cache,
            sleeper: &THREAD_SLEEPER,
            policy,
        }
    }

    /// Replace the thread sleeper used between retries.
    pub fn with_sleeper(mut self, sleeper: &'a dyn Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch one dataset.
    ///
    /// `force_refresh` only matters when every source is disabled: without it
    /// the cached copy is served directly.
    pub fn fetch(
        &self,
        sources: &SourceSet,
        force_refresh: bool,
    ) -> Result<FetchOutcome, AggregateFetchError> {
        let dataset = sources.dataset();
        let mut attempts = Vec::new();
        let mut failures = Vec::new();

        if sources.all_disabled() && !force_refresh {
            debug!(dataset, "all sources disabled, reading cache");
            return self.from_cache(dataset, attempts, failures);
        }

        for source in sources.enabled() {
            match self.try_source(dataset, source, &mut attempts) {
                Ok(data) => {
                    if let Err(e) = self.cache.write(dataset, &source.name, &data) {
                        warn!(dataset, source = %source.name, error = %e, "failed to update cache");
                    }
                    info!(dataset, source = %source.name, rows = data.len(), "fetched");
                    return Ok(FetchOutcome {
                        dataset_name: dataset.to_string(),
                        dataset: data,
                        is_stale: false,
                        origin: DataOrigin::Live {
                            source: source.name.clone(),
                        },
                        attempts,
                    });
                }
                Err(failure) => {
                    warn!(
                        dataset,
                        source = %failure.source,
                        attempts = failure.attempts,
                        kind = %failure.error.kind(),
                        "source exhausted, falling back"
                    );
                    failures.push(failure);
                }
            }
        }

        self.from_cache(dataset, attempts, failures)
    }

    /// Attempt one source until it succeeds, fails permanently, or runs out of retries.
    fn try_source(
        &self,
        dataset: &str,
        source: &SourceDescriptor,
        log: &mut Vec<FetchAttemptResult>,
    ) -> Result<Dataset, SourceFailure> {
        let mut attempt = 1u32;
        loop {
            let result = self
                .transport
                .retrieve(source)
                .and_then(|raw| source.parse(&raw));

            match result {
                Ok(data) => {
                    debug!(dataset, source = %source.name, attempt, rows = data.len(), "attempt succeeded");
                    log.push(FetchAttemptResult {
                        source: source.name.clone(),
                        attempt,
                        outcome: AttemptOutcome::Success { rows: data.len() },
                        at: Utc::now(),
                    });
                    return Ok(data);
                }
                Err(error) => {
                    warn!(
                        dataset,
                        source = %source.name,
                        attempt,
                        kind = %error.kind(),
                        error = %error,
                        "attempt failed"
                    );
                    log.push(FetchAttemptResult {
                        source: source.name.clone(),
                        attempt,
                        outcome: AttemptOutcome::Failure {
                            kind: error.kind(),
                            message: error.to_string(),
                        },
                        at: Utc::now(),
                    });

                    if !error.is_transient() || attempt > self.policy.retries {
                        return Err(SourceFailure {
                            source: source.name.clone(),
                            attempts: attempt,
                            error,
                        });
                    }

                    let delay = self.policy.backoff.delay(attempt);
                    debug!(
                        dataset,
                        source = %source.name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after backoff"
                    );
                    self.sleeper.sleep(delay);
                    attempt += 1;
                }
            }
        }
    }

    fn from_cache(
        &self,
        dataset: &str,
        attempts: Vec<FetchAttemptResult>,
        failures: Vec<SourceFailure>,
    ) -> Result<FetchOutcome, AggregateFetchError> {
        match self.cache.load(dataset) {
            Ok(data) => {
                let meta = self.cache.meta(dataset);
                warn!(dataset, rows = data.len(), "serving stale data from cache");
                Ok(FetchOutcome {
                    dataset_name: dataset.to_string(),
                    dataset: data,
                    is_stale: true,
                    origin: DataOrigin::Cache {
                        cached_at: meta.as_ref().map(|m| m.cached_at),
                        source: meta.map(|m| m.source),
                    },
                    attempts,
                })
            }
            Err(cache) => Err(AggregateFetchError {
                dataset: dataset.to_string(),
                failures,
                cache,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::backoff::{Backoff, BackoffStrategy};
    use crate::data::provider::SourceLocation;
    use crate::data::schema::Schema;
    use std::cell::RefCell;
    use std::time::Duration;

    struct Always(Result<&'static str, FetchError>);

    impl Transport for Always {
        fn retrieve(&self, _source: &SourceDescriptor) -> Result<Vec<u8>, FetchError> {
            self.0.clone().map(|s| s.as_bytes().to_vec())
        }
    }

    #[derive(Default)]
    struct Recorder(RefCell<Vec<Duration>>);

    impl Sleeper for Recorder {
        fn sleep(&self, delay: Duration) {
            self.0.borrow_mut().push(delay);
        }
    }

    fn sources() -> SourceSet {
        SourceSet::new(
            "daily_stats",
            vec![SourceDescriptor::new(
                "kdca",
                1,
                SourceLocation::Http {
                    url: "https://example.org/daily.csv".into(),
                },
                Schema::new(["date", "daily_cases"]),
            )],
        )
        .unwrap()
    }

    fn policy(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            backoff: Backoff {
                strategy: BackoffStrategy::Exponential,
                base_delay_ms: 10,
                max_delay_ms: 25,
            },
        }
    }

    #[test]
    fn sleeps_follow_the_backoff_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CsvCache::new(dir.path());
        let transport = Always(Err(FetchError::Timeout("slow".into())));
        let sleeper = Recorder::default();

        let err = Fetcher::new(&transport, &cache, policy(3))
            .with_sleeper(&sleeper)
            .fetch(&sources(), false)
            .unwrap_err();

        assert_eq!(err.failures[0].attempts, 4);
        let ms: Vec<u128> = sleeper.0.borrow().iter().map(|d| d.as_millis()).collect();
        assert_eq!(ms, [10, 20, 25]);
    }

    #[test]
    fn success_records_one_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CsvCache::new(dir.path());
        let transport = Always(Ok("date,daily_cases\n2022-01-01,5\n"));
        let sleeper = Recorder::default();

        let outcome = Fetcher::new(&transport, &cache, policy(3))
            .with_sleeper(&sleeper)
            .fetch(&sources(), false)
            .unwrap();

        assert!(!outcome.is_stale);
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(outcome.attempts[0].outcome, AttemptOutcome::Success { rows: 1 });
        assert!(sleeper.0.borrow().is_empty());
        assert!(cache.exists("daily_stats"));
    }

    #[test]
    fn aggregate_error_display_mentions_dataset() {
        let err = AggregateFetchError {
            dataset: "regional".into(),
            failures: vec![SourceFailure {
                source: "kdca".into(),
                attempts: 1,
                error: FetchError::HttpStatus {
                    code: 404,
                    url: "https://example.org".into(),
                },
            }],
            cache: CacheError::Io("boom".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("regional"));
        assert!(msg.contains("1 attempted"));
        assert_eq!(
            err.failures[0].to_string(),
            "kdca: HttpStatusError after 1 attempt(s): HTTP 404 from https://example.org"
        );
    }
}
