//! When to purge the image cache
//!
//! The cache is flushed wholesale once a week instead of expiring entries one
//! by one. [`RefreshPolicy`] decides from the last purge time and the current
//! time; [`Clock`] supplies the current time so tests can pin it.

use chrono::{DateTime, Datelike, Duration, Local, Weekday};
use std::sync::Mutex;

/// Source of the current local time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// Reads the system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Weekly full-purge schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    refresh_day: Weekday,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self::weekly(Weekday::Mon)
    }
}

impl RefreshPolicy {
    /// Purges once on each occurrence of `refresh_day`
    pub fn weekly(refresh_day: Weekday) -> Self {
        Self { refresh_day }
    }

    pub fn refresh_day(&self) -> Weekday {
        self.refresh_day
    }

    /// True when `now` is the refresh day and no purge has happened on `now`'s date
    ///
    /// Dates are compared in local time.
    pub fn should_purge(&self, last_refresh: DateTime<Local>, now: DateTime<Local>) -> bool {
        let refreshed_today = last_refresh.date_naive() == now.date_naive();
        !refreshed_today && now.weekday() == self.refresh_day
    }
}
