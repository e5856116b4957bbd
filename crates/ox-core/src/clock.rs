//! Injectable time source.
//!
//! TTL enforcement and the discovery cache both depend on wall-clock
//! time. Components take a `Clock` at construction so tests can drive
//! expiry deterministically instead of sleeping.

use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> SystemTime;

    /// Returns the current time as whole seconds since the Unix epoch.
    fn unix_seconds(&self) -> u64 {
        self.now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs()
    }
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A manually advanced clock.
///
/// # Warning
///
/// Intended for tests only; it never moves unless told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    /// Creates a manual clock starting at the given instant.
    #[must_use]
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Creates a manual clock starting at the Unix epoch.
    #[must_use]
    pub fn at_epoch() -> Self {
        Self::new(UNIX_EPOCH)
    }

    /// Advances the clock by the given duration.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().expect("clock lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::at_epoch();
        assert_eq!(clock.unix_seconds(), 0);

        clock.advance(Duration::from_secs(90));
        assert_eq!(clock.unix_seconds(), 90);
    }

    #[test]
    fn system_clock_is_nonzero() {
        assert!(SystemClock.unix_seconds() > 0);
    }
}
