//! Injected clock abstraction
//!
//! Timestamps are server-assigned and never client-settable, so every
//! component that stamps or compares time takes a [`Clock`] rather than
//! calling the system clock directly. Tests drive a [`ManualClock`] to
//! exercise expiry paths deterministically.

use std::sync::Arc;
use std::sync::Mutex;
use time::{Duration, OffsetDateTime};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> OffsetDateTime;
}

/// Production clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Test clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<OffsetDateTime>>,
}

impl ManualClock {
    /// Create a manual clock pinned at `start`.
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance the clock by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(datetime!(2025-01-01 00:00 UTC));
        assert_eq!(clock.now(), datetime!(2025-01-01 00:00 UTC));

        clock.advance(Duration::minutes(10));
        assert_eq!(clock.now(), datetime!(2025-01-01 00:10 UTC));
    }

    #[test]
    fn clones_share_time() {
        let clock = ManualClock::new(datetime!(2025-01-01 00:00 UTC));
        let other = clock.clone();
        clock.advance(Duration::seconds(5));
        assert_eq!(other.now(), datetime!(2025-01-01 00:00:05 UTC));
    }
}
