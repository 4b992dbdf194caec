//! Deterministic doubles for driving the fetcher.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;
use vaxdash_core::data::{
    Backoff, BackoffStrategy, FetchError, RetryPolicy, Schema, Sleeper, SourceDescriptor,
    SourceLocation, SourceSet, Transport,
};

pub const VACCINATION_CSV: &str = "date,cumulative_first_dose\n2021-03-01,1000\n2021-03-02,2500\n";
pub const OTHER_CSV: &str = "date,cumulative_first_dose\n2021-04-01,9000\n";

/// Replays a fixed script of responses per source name.
///
/// Call `n` of a source returns entry `n` of its script; once the script is
/// exhausted the last entry repeats. Unscripted sources fail with a network error.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: HashMap<String, Vec<Result<Vec<u8>, FetchError>>>,
    calls: RefCell<HashMap<String, u32>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, source: &str, responses: Vec<Result<&str, FetchError>>) -> Self {
        let responses = responses
            .into_iter()
            .map(|r| r.map(|body| body.as_bytes().to_vec()))
            .collect();
        self.scripts.insert(source.to_string(), responses);
        self
    }

    pub fn ok(self, source: &str, body: &str) -> Self {
        self.script(source, vec![Ok(body)])
    }

    pub fn fail(self, source: &str, error: FetchError) -> Self {
        self.script(source, vec![Err(error)])
    }

    pub fn calls(&self, source: &str) -> u32 {
        self.calls.borrow().get(source).copied().unwrap_or(0)
    }
}

impl Transport for ScriptedTransport {
    fn retrieve(&self, source: &SourceDescriptor) -> Result<Vec<u8>, FetchError> {
        let n = {
            let mut calls = self.calls.borrow_mut();
            let count = calls.entry(source.name.clone()).or_insert(0);
            *count += 1;
            *count as usize - 1
        };
        match self.scripts.get(&source.name) {
            Some(script) if !script.is_empty() => script[n.min(script.len() - 1)].clone(),
            _ => Err(FetchError::Network(format!("no script for {}", source.name))),
        }
    }
}

/// Records requested delays instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, delay: Duration) {
        self.delays.borrow_mut().push(delay);
    }
}

pub fn http_source(name: &str, priority: u32) -> SourceDescriptor {
    SourceDescriptor::new(
        name,
        priority,
        SourceLocation::Http {
            url: format!("https://{name}.example.org/vaccination.csv"),
        },
        Schema::new(["date", "cumulative_first_dose"]),
    )
}

pub fn vaccination_sources(names: &[&str]) -> SourceSet {
    let sources = names
        .iter()
        .enumerate()
        .map(|(i, name)| http_source(name, i as u32 + 1))
        .collect();
    SourceSet::new("vaccination", sources).unwrap()
}

pub fn policy(retries: u32) -> RetryPolicy {
    RetryPolicy {
        retries,
        backoff: Backoff {
            strategy: BackoffStrategy::Exponential,
            base_delay_ms: 100,
            max_delay_ms: 1_000,
        },
    }
}

pub fn network_error() -> FetchError {
    FetchError::Network("connection reset by peer".into())
}

pub fn status(code: u16) -> FetchError {
    FetchError::HttpStatus {
        code,
        url: "https://kdca.example.org/vaccination.csv".into(),
    }
}
