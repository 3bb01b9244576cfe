//! Wall-clock aligned polling and health-check countdowns for one handler.
//!
//! The scheduler does not sleep or spawn anything. Its owner calls
//! [`Scheduler::tick`] roughly once per second and reacts to the returned
//! [`DueEvents`]. Countdowns are advanced by the wall-clock time elapsed
//! since the previous tick, so delayed or skipped ticks do not lose time.
//!
//! # Alignment
//!
//! [`Scheduler::init_time`] places the first polling event on a fixed
//! calendar slot: the next instant after "now" whose offset from the top of
//! the hour is a multiple of the slot step, where the step is the polling
//! interval rounded up to whole minutes. The top of the next hour is always
//! a slot, so intervals that do not divide 3600 restart their slot grid every
//! hour (a 45 minute interval fires at :45 and :00). After the first event the
//! countdown is re-armed with the plain interval; realignment only happens on
//! the next `init_time`.

use crate::clock::SharedClock;
use chrono::{Duration, NaiveDateTime, Timelike};
use tracing::debug;

const SECS_PER_MINUTE: i64 = 60;
const SECS_PER_HOUR: i64 = 3600;

/// Events that became due during one tick. Polling is handled first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DueEvents {
    pub polling: bool,
    pub health_check: bool,
}

/// Lifecycle of a scheduler. `Stopped` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Created,
    Running,
    Stopped,
}

/// Polling and health-check timer state of one handler.
///
/// Owned by the handler and mutated only from the thread that drives it.
pub struct Scheduler {
    polling_interval: i64,
    health_check_interval: i64,
    polling_remaining: i64,
    health_remaining: i64,
    last_tick: Option<NaiveDateTime>,
    stopped: bool,
    clock: SharedClock,
}

impl Scheduler {
    /// Creates a scheduler. A `health_check_interval` of 0 disables health
    /// checks entirely. A zero polling interval is raised to one second.
    pub fn new(polling_interval: u32, health_check_interval: u32, clock: SharedClock) -> Self {
        Self {
            polling_interval: i64::from(polling_interval.max(1)),
            health_check_interval: i64::from(health_check_interval),
            polling_remaining: -1,
            health_remaining: -1,
            last_tick: None,
            stopped: false,
            clock,
        }
    }

    pub fn polling_interval(&self) -> i64 {
        self.polling_interval
    }

    pub fn health_check_interval(&self) -> i64 {
        self.health_check_interval
    }

    pub fn health_check_enabled(&self) -> bool {
        self.health_check_interval > 0
    }

    /// Seconds until the next polling event.
    pub fn polling_remaining(&self) -> i64 {
        self.polling_remaining
    }

    /// Seconds until the next health-check event (meaningless when disabled).
    pub fn health_remaining(&self) -> i64 {
        self.health_remaining
    }

    pub fn last_tick(&self) -> Option<NaiveDateTime> {
        self.last_tick
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    pub fn state(&self) -> SchedulerState {
        if self.stopped {
            SchedulerState::Stopped
        } else if self.last_tick.is_some() {
            SchedulerState::Running
        } else {
            SchedulerState::Created
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Aligns both countdowns to the next calendar slot. No-op once stopped.
    pub fn init_time(&mut self) {
        if self.stopped {
            return;
        }
        let now = whole_second(self.clock.now());
        let slot = next_aligned_slot(now, self.polling_interval);
        self.last_tick = Some(now);
        self.polling_remaining = (slot - now).num_seconds();
        if self.health_check_enabled() {
            self.health_remaining = self.polling_remaining;
        }
        debug!(
            polling_interval = self.polling_interval,
            polling_remaining = self.polling_remaining,
            first_slot = %slot,
            "Scheduler aligned"
        );
    }

    /// Advances the countdowns by the wall-clock time since the last tick
    /// and reports which events are due. Due countdowns are re-armed with
    /// their interval. No-op once stopped.
    pub fn tick(&mut self) -> DueEvents {
        let mut due = DueEvents::default();
        if self.stopped {
            return due;
        }

        let now = whole_second(self.clock.now());
        let last = match self.last_tick {
            Some(last) => last,
            None => {
                self.init_time();
                return due;
            }
        };

        // A clock moving backwards counts as no elapsed time.
        let elapsed = (now - last).num_seconds().max(0);
        self.last_tick = Some(now);

        self.polling_remaining -= elapsed;
        if self.health_check_enabled() {
            self.health_remaining -= elapsed;
        }

        if self.polling_remaining <= 0 {
            due.polling = true;
            self.polling_remaining = self.polling_interval;
        }
        if self.health_check_enabled() && self.health_remaining <= 0 {
            due.health_check = true;
            self.health_remaining = self.health_check_interval;
        }

        due
    }

    /// Stops the scheduler for good. Idempotent.
    pub fn stop(&mut self) {
        self.stopped = true;
    }
}

/// Truncates a timestamp to whole seconds so elapsed-time arithmetic carries
/// sub-second remainders over to the next tick instead of dropping them.
fn whole_second(ts: NaiveDateTime) -> NaiveDateTime {
    ts - Duration::nanoseconds(i64::from(ts.nanosecond()))
}

/// Slot step for a polling interval: the interval rounded up to whole
/// minutes, at least one minute.
pub fn slot_step_secs(polling_interval: i64) -> i64 {
    let minutes = (polling_interval + SECS_PER_MINUTE - 1) / SECS_PER_MINUTE;
    minutes.max(1) * SECS_PER_MINUTE
}

/// Returns the first calendar slot strictly after `now` (see module docs).
pub fn next_aligned_slot(now: NaiveDateTime, polling_interval: i64) -> NaiveDateTime {
    let now = whole_second(now);
    let step = slot_step_secs(polling_interval);
    let since_hour = i64::from(now.minute()) * SECS_PER_MINUTE + i64::from(now.second());
    let top_of_hour = now - Duration::seconds(since_hour);
    let offset = ((since_hour / step + 1) * step).min(SECS_PER_HOUR);
    top_of_hour + Duration::seconds(offset)
}
