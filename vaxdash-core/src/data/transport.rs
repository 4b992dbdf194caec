//! The production transport: HTTP, local files, and the synthetic feeds.

use super::http::HttpTransport;
use super::provider::{FetchError, SourceLocation, Transport};
use super::source::SourceDescriptor;
use super::synthetic;
use chrono::NaiveDate;
use std::fs;

/// Dispatches on a source's location.
pub struct DefaultTransport {
    http: HttpTransport,
    synthetic_end: Option<NaiveDate>,
}

impl DefaultTransport {
    pub fn new(http: HttpTransport) -> Self {
        Self {
            http,
            synthetic_end: None,
        }
    }

    /// Pin the last day of the synthetic feeds instead of using today.
    pub fn with_synthetic_end(mut self, end: NaiveDate) -> Self {
        self.synthetic_end = Some(end);
        self
    }
}

impl Transport for DefaultTransport {
    fn retrieve(&self, source: &SourceDescriptor) -> Result<Vec<u8>, FetchError> {
        match &source.location {
            SourceLocation::Http { url } => self.http.get(url),
            SourceLocation::File { path } => fs::read(path)
                .map_err(|e| FetchError::Network(format!("{}: {e}", path.display()))),
            SourceLocation::Synthetic { feed, seed } => {
                let end = self
                    .synthetic_end
                    .unwrap_or_else(|| chrono::Local::now().date_naive());
                synthetic::generate(*feed, *seed, end)
                    .and_then(|ds| ds.to_csv_bytes())
                    .map_err(|e| FetchError::Parse(format!("synthetic {}: {e}", feed.name())))
            }
        }
    }
}
