//! Dispatch counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of a manager's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Emissions accepted into the queue.
    pub emitted: u64,
    /// Closures accepted into the queue via `post`.
    pub posted: u64,
    /// Emissions whose chain has been run.
    pub dispatched: u64,
    /// Posted closures that have been run.
    pub jobs_run: u64,
    /// Listener or job calls that returned an error or panicked.
    pub failures: u64,
    /// Chains cut short by `stop`.
    pub stopped: u64,
    /// Emissions refused because the queue was full.
    pub rejected: u64,
}

impl DispatchStats {
    /// Accepted but not yet processed.
    pub fn in_flight(&self) -> u64 {
        (self.emitted + self.posted).saturating_sub(self.dispatched + self.jobs_run)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) emitted: AtomicU64,
    pub(crate) posted: AtomicU64,
    pub(crate) dispatched: AtomicU64,
    pub(crate) jobs_run: AtomicU64,
    pub(crate) failures: AtomicU64,
    pub(crate) stopped: AtomicU64,
    pub(crate) rejected: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            emitted: self.emitted.load(Ordering::Relaxed),
            posted: self.posted.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            jobs_run: self.jobs_run.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            stopped: self.stopped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}
