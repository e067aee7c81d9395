//! Shared logical clock.
//!
//! The render loop owns the clock and advances it once per tick; caches
//! only read it. Eviction is therefore tied to rendering cadence: a stalled
//! render loop does not age anything out.

use proedit_core::LogicalTime;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cloneable handle to one monotonically non-decreasing timestamp.
#[derive(Debug, Clone, Default)]
pub struct LogicalClock {
    millis: Arc<AtomicU64>,
}

impl LogicalClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(time: LogicalTime) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(time.as_millis())),
        }
    }

    #[inline]
    pub fn now(&self) -> LogicalTime {
        LogicalTime::from_millis(self.millis.load(Ordering::Acquire))
    }

    /// Move the clock to `time`. Earlier values are ignored so the clock
    /// never runs backwards. Returns the resulting time.
    pub fn advance_to(&self, time: LogicalTime) -> LogicalTime {
        let previous = self.millis.fetch_max(time.as_millis(), Ordering::AcqRel);
        LogicalTime::from_millis(previous.max(time.as_millis()))
    }

    pub fn advance_by(&self, delta: Duration) -> LogicalTime {
        let target = self.now().saturating_add(delta);
        self.advance_to(target)
    }
}
