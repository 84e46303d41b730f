//! Clock abstraction used to decide which calendar day a write belongs to.
//!
//! The roller never reads wall-clock time directly. It asks a [`Clock`], so
//! tests and simulations can move the day forward without sleeping.

use {
    chrono::{DateTime, Days, Duration, Local, NaiveDate},
    std::sync::{Mutex, PoisonError},
};

/// Source of the current local time.
pub trait Clock: Send + Sync {
    /// The current time in the local time zone.
    fn now(&self) -> DateTime<Local>;

    /// The current local calendar day.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Reads the system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to.
///
/// # Examples
/// ```
/// use {
///     chrono::Local,
///     dailyroller::{Clock, ManualClock},
/// };
///
/// let clock = ManualClock::new(Local::now());
/// let today = clock.today();
/// clock.advance_days(1);
/// assert_eq!(clock.today(), today.succ_opt().unwrap());
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    /// Create a clock frozen at `now`.
    pub fn new(now: DateTime<Local>) -> Self {
        Self { now: Mutex::new(now) }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    /// Move the clock forward (or backward, for a negative duration).
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = *now + by;
    }

    /// Move to the same wall-clock time `days` calendar days later.
    ///
    /// Unlike `advance(Duration::days(n))` this always lands on a later local
    /// day, even across a daylight-saving change. If that wall-clock time does
    /// not exist on the target day, the clock moves by whole 24-hour steps
    /// instead.
    pub fn advance_days(&self, days: u64) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = match now.checked_add_days(Days::new(days)) {
            Some(next) => next,
            None => *now + Duration::days(days as i64),
        };
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
