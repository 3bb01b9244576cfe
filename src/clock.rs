//! Wall-clock access for schedulers, freshness checks and timers.
//!
//! All timestamps in this crate are naive local times, matching the
//! `YYYY-MM-DD HH:MM:SS.ffffff` strings carried in message payloads.

use chrono::{Duration, Local, NaiveDateTime};
use std::sync::{Arc, Mutex};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Clock backed by the operating system's local time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Settable clock for deterministic tests and simulations.
///
/// Clones share the same underlying time, so a test can keep one handle
/// while handlers hold another.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Arc<Mutex<NaiveDateTime>>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Moves the clock forward (or backward, for a negative duration).
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }

    pub fn set(&self, to: NaiveDateTime) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Shared clock handle as passed to handlers.
pub type SharedClock = Arc<dyn Clock>;

/// Returns a shared handle to the system clock.
pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}
