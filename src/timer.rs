//! Auto-revert timers keyed by generated identifiers.

use chrono::{Duration, NaiveDateTime};
use std::collections::HashMap;
use uuid::Uuid;

/// One outstanding timer.
#[derive(Clone, Debug, PartialEq)]
pub struct Timer<T> {
    pub id: Uuid,
    pub expires_at: NaiveDateTime,
    pub payload: T,
}

/// Independent timers owned by one actor or device handler.
///
/// A timer is removed when it is taken as expired or when the set is
/// cleared; nothing else references it.
#[derive(Debug)]
pub struct TimerSet<T> {
    timers: HashMap<Uuid, Timer<T>>,
}

impl<T> Default for TimerSet<T> {
    fn default() -> Self {
        Self {
            timers: HashMap::new(),
        }
    }
}

impl<T> TimerSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a timer that expires `duration_secs` after `now`.
    pub fn create(&mut self, duration_secs: u32, payload: T, now: NaiveDateTime) -> Uuid {
        let id = Uuid::new_v4();
        let expires_at = now + Duration::seconds(i64::from(duration_secs));
        self.timers.insert(
            id,
            Timer {
                id,
                expires_at,
                payload,
            },
        );
        id
    }

    /// Removes and returns every timer whose expiry is at or before `now`,
    /// earliest first.
    pub fn take_expired(&mut self, now: NaiveDateTime) -> Vec<Timer<T>> {
        let expired_ids: Vec<Uuid> = self
            .timers
            .values()
            .filter(|t| t.expires_at <= now)
            .map(|t| t.id)
            .collect();

        let mut expired: Vec<Timer<T>> = expired_ids
            .iter()
            .filter_map(|id| self.timers.remove(id))
            .collect();
        expired.sort_by_key(|t| t.expires_at);
        expired
    }

    pub fn get(&self, id: &Uuid) -> Option<&Timer<T>> {
        self.timers.get(id)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_timer_expires_at_deadline_not_before() {
        let mut timers = TimerSet::new();
        let id = timers.create(5, (), t0());
        assert_eq!(timers.get(&id).unwrap().expires_at, t0() + Duration::seconds(5));

        assert!(timers.take_expired(t0() + Duration::seconds(4)).is_empty());
        let expired = timers.take_expired(t0() + Duration::seconds(5));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, id);
        assert!(timers.is_empty());
        assert!(timers.take_expired(t0() + Duration::seconds(6)).is_empty());
    }

    #[test]
    fn test_overlapping_timers_are_independent() {
        let mut timers = TimerSet::new();
        timers.create(10, "late", t0());
        timers.create(3, "early", t0());
        timers.create(3, "early-too", t0() + Duration::seconds(1));

        let expired = timers.take_expired(t0() + Duration::seconds(4));
        let payloads: Vec<_> = expired.iter().map(|t| t.payload).collect();
        assert_eq!(payloads, vec!["early", "early-too"]);
        assert_eq!(timers.len(), 1);
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut timers = TimerSet::new();
        timers.create(1, (), t0());
        timers.create(2, (), t0());
        timers.clear();
        assert!(timers.take_expired(t0() + Duration::seconds(10)).is_empty());
    }
}
