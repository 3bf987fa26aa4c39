//! Wall-clock abstraction.
//!
//! Risk scoring depends on the time of day and day of week, and session
//! expiry depends on elapsed time. Both read the clock through [`Clock`]
//! so hosts and tests can substitute a controllable source.

use chrono::{DateTime, Utc};
use std::fmt;

/// Source of the current time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// The current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
