//! Message freshness policy.
//!
//! Inbound commands and probes carry their creation time. A message older
//! than the threshold for its kind is discarded. Age equal to the threshold
//! is still fresh.

use chrono::{Duration, NaiveDateTime};

/// Maximum age of actor commands and output commands.
pub const COMMAND_MAX_AGE_SECS: i64 = 10;

/// Maximum age of input probes consumed by sensors.
pub const PROBE_MAX_AGE_SECS: i64 = 30;

/// Result of a freshness check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale { age: Duration },
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Freshness::Fresh)
    }
}

/// Age threshold applied to one kind of inbound message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreshnessPolicy {
    max_age: Duration,
}

impl FreshnessPolicy {
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }

    pub fn commands() -> Self {
        Self::new(Duration::seconds(COMMAND_MAX_AGE_SECS))
    }

    pub fn probes() -> Self {
        Self::new(Duration::seconds(PROBE_MAX_AGE_SECS))
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Checks a message created at `created_at`, received at `now`.
    ///
    /// Messages stamped in the future (sender clock ahead) have a negative
    /// age and are fresh.
    pub fn check(&self, created_at: NaiveDateTime, now: NaiveDateTime) -> Freshness {
        let age = now - created_at;
        if age > self.max_age {
            Freshness::Stale { age }
        } else {
            Freshness::Fresh
        }
    }
}

/// Formats an age as fractional seconds for log fields.
pub fn age_secs(age: Duration) -> f64 {
    age.num_microseconds()
        .map(|us| us as f64 / 1_000_000.0)
        .unwrap_or_else(|| age.num_seconds() as f64)
}
