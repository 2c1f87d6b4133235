use chrono::{DateTime, Utc};

/// Source of wall-clock time for timers and creation stamps. Lets tests
/// step time forward instead of sleeping.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub use manual::ManualClock;
