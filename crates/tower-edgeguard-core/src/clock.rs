//! Wall-clock time source shared by the stateful components.
//!
//! Rate-limit decisions expose UNIX-second reset times and the sliding
//! window has to survive wall-clock jumps, so the seam is [`SystemTime`]
//! rather than `Instant`. Production code uses [`SystemClock`]; tests
//! drive a [`ManualClock`] wherever ordering or skew matters.

use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Returns the current wall-clock instant.
    fn now(&self) -> SystemTime;
}

/// The process clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A hand-driven clock for tests.
///
/// Unlike `Instant`, a `ManualClock` can move backward, which is exactly
/// what the clock-skew defense needs to be exercised against.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    /// Creates a clock frozen at the given instant.
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Creates a clock frozen at `UNIX_EPOCH + secs`.
    pub fn at_epoch_secs(secs: u64) -> Self {
        Self::new(UNIX_EPOCH + Duration::from_secs(secs))
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    /// Moves the clock backward.
    pub fn rewind(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now = now.checked_sub(by).unwrap_or(UNIX_EPOCH);
    }

    /// Pins the clock to an absolute instant.
    pub fn set(&self, to: SystemTime) {
        *self.now.lock().unwrap() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap()
    }
}
