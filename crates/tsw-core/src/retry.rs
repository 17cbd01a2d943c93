//! Exponential backoff for transient store statuses.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tsw_common::{Error, Result};

use crate::store::Status;

pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_DELAY: Duration = Duration::from_millis(3000);
pub const DEFAULT_EXPONENT: u32 = 2;
pub const DEFAULT_JITTER: f64 = 0.1;

/// Remaining retry budget and the delay before the next attempt.
///
/// Values are immutable; [`next`](Self::next) returns the following state
/// so the previous one stays available for logging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryOptions {
    pub retries_left: u32,
    #[serde(rename = "delay_ms", with = "millis")]
    pub delay: Duration,
    pub exponent: u32,
    /// Parsed and kept, not applied to the delay.
    pub jitter: f64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        RetryOptions {
            retries_left: DEFAULT_RETRIES,
            delay: DEFAULT_DELAY,
            exponent: DEFAULT_EXPONENT,
            jitter: DEFAULT_JITTER,
        }
    }
}

impl RetryOptions {
    pub fn new(retries_left: u32, delay: Duration, exponent: u32, jitter: f64) -> Self {
        RetryOptions {
            retries_left,
            delay,
            exponent,
            jitter,
        }
    }

    /// A single attempt, never retried.
    pub fn none() -> Self {
        RetryOptions {
            retries_left: 0,
            ..RetryOptions::default()
        }
    }

    /// `retries` attempts with the default delay and exponent.
    pub fn with_retries(retries: u32) -> Self {
        RetryOptions {
            retries_left: retries,
            ..RetryOptions::default()
        }
    }

    pub fn has_next(&self) -> bool {
        self.retries_left > 0
    }

    /// The state after one more retry: one fewer left, delay scaled by `exponent`.
    pub fn next(&self) -> Result<RetryOptions> {
        if !self.has_next() {
            return Err(Error::RetriesExhausted);
        }
        Ok(RetryOptions {
            retries_left: self.retries_left - 1,
            delay: self.delay.saturating_mul(self.exponent),
            exponent: self.exponent,
            jitter: self.jitter,
        })
    }

    pub fn should_retry(&self, status: &Status) -> bool {
        self.has_next() && status.is_retryable()
    }

    pub fn validate(&self) -> Result<()> {
        if self.exponent == 0 {
            return Err(Error::InvalidArgument(
                "retry exponent must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(Error::InvalidArgument(format!(
                "retry jitter must be within [0, 1], got {}",
                self.jitter
            )));
        }
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Blocking pause between attempts.
pub trait Sleep {
    fn sleep(&mut self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleep;

impl Sleep for ThreadSleep {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<Z: Sleep + ?Sized> Sleep for &mut Z {
    fn sleep(&mut self, duration: Duration) {
        (**self).sleep(duration)
    }
}
