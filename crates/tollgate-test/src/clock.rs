//! A clock tests can move by hand.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::sync::Mutex;
use std::time::Duration;
use tollgate_core::Clock;

/// [`Clock`] that only moves when told to.
///
/// Defaults to 2026-03-04 12:00:00 UTC, a Wednesday at noon: outside the
/// default off-hours window and not the default risky weekday.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Clock frozen at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Clock frozen at the given UTC wall time.
    ///
    /// # Panics
    ///
    /// Panics if the components do not form a valid date and time.
    #[must_use]
    pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Self {
        let now = Utc
            .with_ymd_and_hms(year, month, day, hour, minute, 0)
            .single()
            .unwrap_or_else(|| panic!("invalid test time {year}-{month}-{day} {hour}:{minute}"));
        Self::new(now)
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        let mut now = self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *now = now.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    /// Jump to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = now;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(2026, 3, 4, 12, 0)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike, Weekday};

    #[test]
    fn test_default_is_wednesday_noon() {
        let now = ManualClock::default().now();
        assert_eq!(now.weekday(), Weekday::Wed);
        assert_eq!(now.hour(), 12);
    }

    #[test]
    fn test_advance_and_set() {
        let clock = ManualClock::default();
        let start = clock.now();
        clock.advance(Duration::from_secs(90));
        assert_eq!(clock.now().signed_duration_since(start), TimeDelta::seconds(90));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
