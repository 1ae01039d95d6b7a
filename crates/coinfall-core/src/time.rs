//! Time sources for spawn and placement timestamps
//!
//! Provides millisecond time behind a trait so hosts and tests can choose:
//! - `SystemClock` - wall-clock milliseconds since the Unix epoch
//! - `ManualClock` - explicitly advanced time for tests and headless hosts

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since an arbitrary but fixed epoch
pub type Millis = i64;

/// Source of the current time in milliseconds
pub trait TimeSource: Send + Sync {
    /// Current time in milliseconds
    fn now_millis(&self) -> Millis;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn now_millis(&self) -> Millis {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as Millis)
            .unwrap_or(0)
    }
}

/// Time that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Create a clock starting at `start` milliseconds
    pub fn new(start: Millis) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, millis: Millis) {
        self.now.store(millis, Ordering::SeqCst);
    }

    /// Move forward by `by`
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as Millis, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now_millis(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}

/// Convert a duration to signed milliseconds, saturating
pub fn duration_millis(duration: Duration) -> Millis {
    Millis::try_from(duration.as_millis()).unwrap_or(Millis::MAX)
}
