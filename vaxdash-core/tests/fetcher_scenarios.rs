//! Fetcher behavior: priority order, retry budget, fallback, and cache.

mod support;

use support::*;
use vaxdash_core::data::{
    AttemptOutcome, CacheError, CsvCache, DataOrigin, FailureKind, FetchError, Fetcher, SourceSet,
};
use vaxdash_core::Dataset;

fn csv(body: &str) -> Dataset {
    Dataset::from_csv(body.as_bytes()).unwrap()
}

#[test]
fn first_source_success_skips_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CsvCache::new(dir.path());
    let transport = ScriptedTransport::new()
        .ok("kdca", VACCINATION_CSV)
        .ok("owid", OTHER_CSV);
    let sleeper = RecordingSleeper::default();

    let outcome = Fetcher::new(&transport, &cache, policy(3))
        .with_sleeper(&sleeper)
        .fetch(&vaccination_sources(&["kdca", "owid"]), false)
        .unwrap();

    assert_eq!(transport.calls("kdca"), 1);
    assert_eq!(transport.calls("owid"), 0);
    assert!(!outcome.is_stale);
    assert_eq!(
        outcome.origin,
        DataOrigin::Live {
            source: "kdca".into()
        }
    );
    assert_eq!(outcome.dataset, csv(VACCINATION_CSV));
    assert!(sleeper.delays().is_empty());
}

#[test]
fn network_failure_retries_then_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CsvCache::new(dir.path());
    let transport = ScriptedTransport::new()
        .fail("kdca", network_error())
        .ok("owid", OTHER_CSV);
    let sleeper = RecordingSleeper::default();

    let outcome = Fetcher::new(&transport, &cache, policy(2))
        .with_sleeper(&sleeper)
        .fetch(&vaccination_sources(&["kdca", "owid"]), false)
        .unwrap();

    assert_eq!(transport.calls("kdca"), 3);
    assert_eq!(transport.calls("owid"), 1);
    assert_eq!(outcome.attempts_for("kdca"), 3);
    assert_eq!(outcome.attempts_for("owid"), 1);
    assert!(!outcome.is_stale);
    assert_eq!(
        outcome.origin,
        DataOrigin::Live {
            source: "owid".into()
        }
    );
    assert_eq!(sleeper.delays().len(), 2);

    let kinds: Vec<_> = outcome
        .attempts
        .iter()
        .map(|a| (a.source.as_str(), a.attempt, matches!(a.outcome, AttemptOutcome::Success { .. })))
        .collect();
    assert_eq!(
        kinds,
        [("kdca", 1, false), ("kdca", 2, false), ("kdca", 3, false), ("owid", 1, true)]
    );
}

#[test]
fn not_found_without_cache_fails_after_one_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CsvCache::new(dir.path());
    let transport = ScriptedTransport::new().fail("kdca", status(404));
    let sleeper = RecordingSleeper::default();

    let err = Fetcher::new(&transport, &cache, policy(3))
        .with_sleeper(&sleeper)
        .fetch(&vaccination_sources(&["kdca"]), false)
        .unwrap_err();

    assert_eq!(transport.calls("kdca"), 1);
    assert_eq!(err.failures.len(), 1);
    assert_eq!(err.failures[0].source, "kdca");
    assert_eq!(err.failures[0].attempts, 1);
    assert_eq!(err.failures[0].error.kind(), FailureKind::HttpStatus);
    assert!(matches!(err.cache, CacheError::Unavailable { .. }));
    assert!(sleeper.delays().is_empty());
}

#[test]
fn client_errors_are_never_retried() {
    for code in [400u16, 401, 403, 404, 410, 429] {
        let dir = tempfile::tempdir().unwrap();
        let cache = CsvCache::new(dir.path());
        let transport = ScriptedTransport::new()
            .fail("kdca", status(code))
            .ok("owid", OTHER_CSV);

        let outcome = Fetcher::new(&transport, &cache, policy(5))
            .with_sleeper(&RecordingSleeper::default())
            .fetch(&vaccination_sources(&["kdca", "owid"]), false)
            .unwrap();

        assert_eq!(transport.calls("kdca"), 1, "HTTP {code}");
        assert_eq!(outcome.attempts_for("owid"), 1);
    }
}

#[test]
fn server_errors_are_retried() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CsvCache::new(dir.path());
    let transport = ScriptedTransport::new().script(
        "kdca",
        vec![Err(status(503)), Err(status(502)), Ok(VACCINATION_CSV)],
    );

    let outcome = Fetcher::new(&transport, &cache, policy(3))
        .with_sleeper(&RecordingSleeper::default())
        .fetch(&vaccination_sources(&["kdca"]), false)
        .unwrap();

    assert_eq!(transport.calls("kdca"), 3);
    assert_eq!(outcome.dataset, csv(VACCINATION_CSV));
}

#[test]
fn parse_and_schema_failures_fall_through_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CsvCache::new(dir.path());
    let transport = ScriptedTransport::new()
        .ok("kdca", "<!DOCTYPE html><html><body>Status</body></html>")
        .ok("mirror", "date,doses\n2021-03-01,5\n")
        .ok("owid", OTHER_CSV);

    let outcome = Fetcher::new(&transport, &cache, policy(3))
        .with_sleeper(&RecordingSleeper::default())
        .fetch(&vaccination_sources(&["kdca", "mirror", "owid"]), false)
        .unwrap();

    assert_eq!(transport.calls("kdca"), 1);
    assert_eq!(transport.calls("mirror"), 1);
    assert_eq!(
        outcome.origin,
        DataOrigin::Live {
            source: "owid".into()
        }
    );
    match &outcome.attempts[1].outcome {
        AttemptOutcome::Failure { kind, message } => {
            assert_eq!(*kind, FailureKind::Parse);
            assert!(message.contains("cumulative_first_dose"), "{message}");
        }
        other => panic!("expected a parse failure, got {other:?}"),
    }
}

#[test]
fn header_only_payload_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CsvCache::new(dir.path());
    let transport = ScriptedTransport::new().ok("kdca", "date,cumulative_first_dose\n");

    let err = Fetcher::new(&transport, &cache, policy(1))
        .with_sleeper(&RecordingSleeper::default())
        .fetch(&vaccination_sources(&["kdca"]), false)
        .unwrap_err();

    assert!(matches!(err.failures[0].error, FetchError::Parse(_)));
    assert_eq!(transport.calls("kdca"), 1);
}

#[test]
fn all_sources_failing_serves_stale_cache() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CsvCache::new(dir.path());
    cache
        .write("vaccination", "owid", &csv(OTHER_CSV))
        .unwrap();

    let transport = ScriptedTransport::new()
        .fail("kdca", status(500))
        .fail("owid", FetchError::Timeout("30s elapsed".into()));

    let outcome = Fetcher::new(&transport, &cache, policy(1))
        .with_sleeper(&RecordingSleeper::default())
        .fetch(&vaccination_sources(&["kdca", "owid"]), true)
        .unwrap();

    assert!(outcome.is_stale);
    assert_eq!(outcome.dataset, csv(OTHER_CSV));
    match outcome.origin {
        DataOrigin::Cache { source, cached_at } => {
            assert_eq!(source.as_deref(), Some("owid"));
            assert!(cached_at.is_some());
        }
        other => panic!("expected cache origin, got {other:?}"),
    }
    assert_eq!(transport.calls("kdca"), 2);
    assert_eq!(transport.calls("owid"), 2);
}

#[test]
fn no_cache_reports_one_failure_per_source() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CsvCache::new(dir.path());
    let transport = ScriptedTransport::new()
        .fail("kdca", network_error())
        .fail("owid", status(404))
        .ok("simulated", "not,the,right,columns\n1,2,3,4\n");

    let err = Fetcher::new(&transport, &cache, policy(2))
        .with_sleeper(&RecordingSleeper::default())
        .fetch(&vaccination_sources(&["kdca", "owid", "simulated"]), false)
        .unwrap_err();

    let summary: Vec<_> = err
        .failures
        .iter()
        .map(|f| (f.source.as_str(), f.attempts, f.error.kind()))
        .collect();
    assert_eq!(
        summary,
        [
            ("kdca", 3, FailureKind::Network),
            ("owid", 1, FailureKind::HttpStatus),
            ("simulated", 1, FailureKind::Parse),
        ]
    );
    assert_eq!(err.dataset, "vaccination");
}

#[test]
fn success_overwrites_cache_for_later_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CsvCache::new(dir.path());
    cache
        .write("vaccination", "kdca", &csv(VACCINATION_CSV))
        .unwrap();
    let sources = vaccination_sources(&["kdca"]);

    let live = ScriptedTransport::new().ok("kdca", OTHER_CSV);
    Fetcher::new(&live, &cache, policy(0))
        .fetch(&sources, false)
        .unwrap();

    let down = ScriptedTransport::new().fail("kdca", status(404));
    let outcome = Fetcher::new(&down, &cache, policy(0))
        .fetch(&sources, false)
        .unwrap();

    assert!(outcome.is_stale);
    assert_eq!(outcome.dataset, csv(OTHER_CSV));
}

#[test]
fn failed_sidecar_write_keeps_fallback_usable() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CsvCache::new(dir.path());
    cache
        .write("vaccination", "kdca", &csv(VACCINATION_CSV))
        .unwrap();
    std::fs::create_dir(dir.path().join("vaccination.meta.json.tmp")).unwrap();
    let sources = vaccination_sources(&["owid"]);

    let live = ScriptedTransport::new().ok("owid", OTHER_CSV);
    let outcome = Fetcher::new(&live, &cache, policy(0))
        .fetch(&sources, false)
        .unwrap();
    assert!(!outcome.is_stale);

    let down = ScriptedTransport::new().fail("owid", status(404));
    let outcome = Fetcher::new(&down, &cache, policy(0))
        .fetch(&sources, false)
        .unwrap();

    assert!(outcome.is_stale);
    assert_eq!(outcome.dataset, csv(OTHER_CSV));
    assert!(!dir.path().join("vaccination.csv.quarantined").exists());
}

#[test]
fn disabled_sources_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CsvCache::new(dir.path());
    let sources = SourceSet::new(
        "vaccination",
        vec![http_source("kdca", 1).disabled(), http_source("owid", 2)],
    )
    .unwrap();
    let transport = ScriptedTransport::new()
        .ok("kdca", VACCINATION_CSV)
        .ok("owid", OTHER_CSV);

    let outcome = Fetcher::new(&transport, &cache, policy(0))
        .fetch(&sources, false)
        .unwrap();

    assert_eq!(transport.calls("kdca"), 0);
    assert_eq!(outcome.dataset, csv(OTHER_CSV));
}

#[test]
fn all_disabled_uses_cache_unless_refresh_is_forced() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CsvCache::new(dir.path());
    let sources =
        SourceSet::new("vaccination", vec![http_source("kdca", 1).disabled()]).unwrap();
    let transport = ScriptedTransport::new().ok("kdca", VACCINATION_CSV);
    let fetcher = Fetcher::new(&transport, &cache, policy(0));

    let err = fetcher.fetch(&sources, false).unwrap_err();
    assert!(err.failures.is_empty());
    assert!(matches!(err.cache, CacheError::Unavailable { .. }));

    cache
        .write("vaccination", "kdca", &csv(VACCINATION_CSV))
        .unwrap();
    let outcome = fetcher.fetch(&sources, false).unwrap();
    assert!(outcome.is_stale);
    assert!(outcome.attempts.is_empty());

    // Forcing a refresh with nothing enabled still ends at the cache.
    let outcome = fetcher.fetch(&sources, true).unwrap();
    assert!(outcome.is_stale);
    assert_eq!(transport.calls("kdca"), 0);
}

#[test]
fn corrupt_cache_is_reported_in_the_aggregate_error() {
    let dir = tempfile::tempdir().unwrap();
    let cache = CsvCache::new(dir.path());
    cache
        .write("vaccination", "kdca", &csv(VACCINATION_CSV))
        .unwrap();
    std::fs::write(cache.data_path("vaccination"), "garbage\n").unwrap();

    let transport = ScriptedTransport::new().fail("kdca", status(404));
    let err = Fetcher::new(&transport, &cache, policy(0))
        .fetch(&vaccination_sources(&["kdca"]), false)
        .unwrap_err();

    assert!(matches!(err.cache, CacheError::Corrupt { .. }));
    assert!(dir.path().join("vaccination.csv.quarantined").exists());
}

#[test]
fn cache_write_failure_does_not_fail_the_fetch() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the cache directory should be.
    let blocker = dir.path().join("cache");
    std::fs::write(&blocker, "").unwrap();
    let cache = CsvCache::new(&blocker);

    let transport = ScriptedTransport::new().ok("kdca", VACCINATION_CSV);
    let outcome = Fetcher::new(&transport, &cache, policy(0))
        .fetch(&vaccination_sources(&["kdca"]), false)
        .unwrap();

    assert!(!outcome.is_stale);
    assert!(!cache.exists("vaccination"));
}
