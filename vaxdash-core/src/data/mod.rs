//! Data acquisition: transports, parsing, retry, fallback, and caching.

pub mod backoff;
pub mod cache;
pub mod fetcher;
pub mod http;
pub mod parse;
pub mod provider;
pub mod schema;
pub mod source;
pub mod synthetic;
pub mod transport;

pub use backoff::{Backoff, BackoffStrategy, RetryPolicy, Sleeper, ThreadSleeper};
pub use cache::{CacheError, CacheMeta, CacheStatus, CsvCache};
pub use fetcher::{
    AggregateFetchError, AttemptOutcome, DataOrigin, FetchAttemptResult, FetchOutcome, Fetcher,
    SourceFailure,
};
pub use http::{HttpTransport, DEFAULT_USER_AGENT};
pub use parse::Parser;
pub use provider::{FailureKind, FetchError, SourceLocation, SyntheticFeed, Transport};
pub use schema::{Schema, SchemaError};
pub use source::{SourceDescriptor, SourceError, SourceSet};
pub use transport::DefaultTransport;
