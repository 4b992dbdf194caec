//! Transport trait and structured fetch error types.
//!
//! The Transport trait abstracts over where raw bytes come from (HTTP, local
//! files, the built-in synthetic feeds) so the fetcher can be driven by a
//! scripted transport in tests.

use super::source::SourceDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single fetch attempt.
///
/// These are designed to be displayable in CLI output and log lines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("HTTP {code} from {url}")]
    HttpStatus { code: u16, url: String },

    #[error("parse error: {0}")]
    Parse(String),
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Network(_) => FailureKind::Network,
            FetchError::Timeout(_) => FailureKind::Timeout,
            FetchError::HttpStatus { .. } => FailureKind::HttpStatus,
            FetchError::Parse(_) => FailureKind::Parse,
        }
    }

    /// Whether a retry of the same source may succeed.
    ///
    /// Network and timeout failures are transient, as are 5xx responses.
    /// Every other status code and every parse failure is final for the source.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Timeout(_) => true,
            FetchError::HttpStatus { code, .. } => (500..600).contains(code),
            FetchError::Parse(_) => false,
        }
    }
}

/// Classification of a fetch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    Network,
    Timeout,
    HttpStatus,
    Parse,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Network => "NetworkError",
            FailureKind::Timeout => "TimeoutError",
            FailureKind::HttpStatus => "HttpStatusError",
            FailureKind::Parse => "ParseError",
        };
        f.write_str(name)
    }
}

/// Built-in simulated feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntheticFeed {
    Vaccination,
    DailyStats,
    Regional,
}

impl SyntheticFeed {
    pub fn name(&self) -> &'static str {
        match self {
            SyntheticFeed::Vaccination => "vaccination",
            SyntheticFeed::DailyStats => "daily_stats",
            SyntheticFeed::Regional => "regional",
        }
    }
}

/// Where a source's raw bytes come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceLocation {
    Http { url: String },
    File { path: PathBuf },
    Synthetic {
        feed: SyntheticFeed,
        #[serde(default = "default_seed")]
        seed: u64,
    },
}

fn default_seed() -> u64 {
    42
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::Http { url } => write!(f, "{url}"),
            SourceLocation::File { path } => write!(f, "file://{}", path.display()),
            SourceLocation::Synthetic { feed, seed } => {
                write!(f, "synthetic:{}?seed={seed}", feed.name())
            }
        }
    }
}

/// Retrieves the raw payload for a source.
///
/// Implementations only move bytes; parsing and schema validation happen in
/// the fetcher so every transport gets identical treatment.
pub trait Transport {
    fn retrieve(&self, source: &SourceDescriptor) -> Result<Vec<u8>, FetchError>;
}
