//! Where "today" comes from.
//!
//! Engine code never reads the system time directly. It asks a [Clock], which
//! lets tests and replays pin the current date.

use std::sync::Mutex;

use time::{Date, OffsetDateTime};

use crate::{Error, timezone::get_offset_at};

/// Supplies the current instant in a fixed timezone.
pub trait Clock: Send + Sync {
    /// The current date and time.
    fn now(&self) -> OffsetDateTime;

    /// The current calendar day in the clock's timezone.
    fn today(&self) -> Date {
        self.now().date()
    }
}

/// The system clock in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct UtcClock;

impl Clock for UtcClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// The system clock shifted into a canonical timezone, e.g. "Pacific/Auckland".
#[derive(Debug, Clone)]
pub struct TimezoneClock {
    timezone: String,
}

impl TimezoneClock {
    /// Create a clock for `canonical_timezone`.
    ///
    /// # Errors
    /// Returns an [Error::InvalidTimezoneError] if the name is not a known timezone.
    pub fn new(canonical_timezone: &str) -> Result<Self, Error> {
        match get_offset_at(canonical_timezone, OffsetDateTime::now_utc()) {
            Some(_) => Ok(Self {
                timezone: canonical_timezone.to_owned(),
            }),
            None => Err(Error::InvalidTimezoneError(canonical_timezone.to_owned())),
        }
    }

    /// The canonical name of the clock's timezone.
    pub fn timezone(&self) -> &str {
        &self.timezone
    }
}

impl Clock for TimezoneClock {
    fn now(&self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();

        // The name was validated on construction.
        match get_offset_at(&self.timezone, now) {
            Some(offset) => now.to_offset(offset),
            None => now,
        }
    }
}

/// A clock pinned to one instant until it is moved with [FixedClock::set].
#[derive(Debug)]
pub struct FixedClock(Mutex<OffsetDateTime>);

impl FixedClock {
    /// Create a clock that always reports `now`.
    pub fn new(now: OffsetDateTime) -> Self {
        Self(Mutex::new(now))
    }

    /// Create a clock that reports midday UTC on `date`.
    pub fn on(date: Date) -> Self {
        Self::new(date.midnight().assume_utc() + time::Duration::hours(12))
    }

    /// Move the clock to `now`.
    pub fn set(&self, now: OffsetDateTime) {
        match self.0.lock() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }

    /// Move the clock to midday UTC on `date`.
    pub fn set_date(&self, date: Date) {
        self.set(date.midnight().assume_utc() + time::Duration::hours(12));
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        match self.0.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
