//! Retry policy: how many retries per source and how long to wait between them.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Fixed,
    #[default]
    Exponential,
}

/// Wait schedule between retries of one source.
///
/// Delays never decrease as the retry number grows: `Fixed` waits
/// `base_delay_ms` every time, `Exponential` doubles from `base_delay_ms`
/// and saturates at `max_delay_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Backoff {
    pub strategy: BackoffStrategy,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Exponential,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl Backoff {
    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let cap = self.max_delay_ms.max(self.base_delay_ms);
        let ms = match self.strategy {
            BackoffStrategy::Fixed => self.base_delay_ms,
            BackoffStrategy::Exponential => {
                let shift = retry.saturating_sub(1).min(63);
                self.base_delay_ms
                    .checked_mul(1u64 << shift)
                    .unwrap_or(u64::MAX)
                    .min(cap)
            }
        };
        Duration::from_millis(ms)
    }
}

/// Retry count plus wait schedule, shared by every source of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt; a source is tried at most `retries + 1` times.
    pub retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff: Backoff::default(),
        }
    }
}

/// Blocks the calling thread between retries.
pub trait Sleeper {
    fn sleep(&self, delay: Duration);
}

/// `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}
