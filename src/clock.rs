//! Monotonic time source collaborator.
//!
//! The garbage collector and snapshot manager time their own operations
//! (GC pass duration, grace-period spin budget) but never need wall-clock
//! time. This trait keeps that dependency injectable so tests can use a
//! deterministic fake instead of real time.

use std::time::{Duration, Instant};

/// A source of monotonic durations.
pub trait Clock: Send + Sync {
    /// Elapsed time since some fixed but unspecified starting point.
    ///
    /// Only differences between two calls are meaningful.
    fn now_monotonic(&self) -> Duration;
}

/// A [`Clock`] backed by [`std::time::Instant`].
#[derive(Debug, Default)]
pub struct StdClock {
    epoch: std::sync::OnceLock<Instant>,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            epoch: std::sync::OnceLock::new(),
        }
    }
}

impl Clock for StdClock {
    fn now_monotonic(&self) -> Duration {
        let epoch = self.epoch.get_or_init(Instant::now);
        epoch.elapsed()
    }
}
