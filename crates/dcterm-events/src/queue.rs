//! Dispatch queue and wake signal.
//!
//! These two are the only state shared across thread boundaries: any number
//! of producers push, the dispatch thread pops. Every successful push is
//! followed by exactly one [`WakeSignal::notify`], so the consumer wakes once
//! per queued item (plus once per `quit`).

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use tracing::warn;

use crate::context::Emission;
use crate::error::{EventError, Result};
use crate::overflow_policy::OverflowPolicy;

/// A closure scheduled with `post`.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// One queued unit of work.
pub(crate) enum Pending {
    Emit(Emission),
    Job(Job),
}

struct QueueState {
    items: VecDeque<Pending>,
    closed: bool,
}

/// Capacity-bounded FIFO of pending emissions.
pub(crate) struct DispatchQueue {
    state: Mutex<QueueState>,
    space: Condvar,
    capacity: usize,
    policy: OverflowPolicy,
}

impl DispatchQueue {
    pub(crate) fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            space: Condvar::new(),
            capacity,
            policy,
        }
    }

    /// Appends an item, applying the overflow policy when full.
    ///
    /// `on_dispatch_thread` downgrades `Block` to `Grow`: the dispatch thread
    /// is the only consumer, so it must never wait for itself.
    pub(crate) fn push(&self, item: Pending, on_dispatch_thread: bool) -> Result<()> {
        let policy = match self.policy {
            OverflowPolicy::Block if on_dispatch_thread => OverflowPolicy::Grow,
            policy => policy,
        };

        let mut state = self
            .state
            .lock()
            .map_err(|e| EventError::LockPoisoned(e.to_string()))?;

        loop {
            if state.closed {
                return Err(EventError::Closed);
            }
            if state.items.len() < self.capacity {
                break;
            }
            match policy {
                OverflowPolicy::Grow => {
                    if state.items.len() == self.capacity {
                        warn!(capacity = self.capacity, "dispatch queue full, growing");
                    }
                    break;
                }
                OverflowPolicy::Reject => {
                    return Err(EventError::QueueOverflow {
                        capacity: self.capacity,
                    });
                }
                OverflowPolicy::Block => {
                    state = self
                        .space
                        .wait(state)
                        .map_err(|e| EventError::LockPoisoned(e.to_string()))?;
                }
            }
        }

        state.items.push_back(item);
        Ok(())
    }

    /// Removes the oldest item.
    pub(crate) fn pop(&self) -> Result<Option<Pending>> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| EventError::LockPoisoned(e.to_string()))?;
        let item = state.items.pop_front();
        if item.is_some() {
            self.space.notify_one();
        }
        Ok(item)
    }

    /// Closes the queue if, and only if, it is empty. The check and the close
    /// happen under one lock so no push can slip in between.
    pub(crate) fn close_if_empty(&self) -> Result<bool> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| EventError::LockPoisoned(e.to_string()))?;
        if !state.items.is_empty() {
            return Ok(false);
        }
        state.closed = true;
        // Blocked producers must observe the close instead of waiting forever.
        self.space.notify_all();
        Ok(true)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().map(|s| s.closed).unwrap_or(true)
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().map(|s| s.items.len()).unwrap_or(0)
    }
}

/// Counting semaphore the dispatch thread sleeps on while the queue is empty.
#[derive(Debug, Default)]
pub(crate) struct WakeSignal {
    permits: Mutex<usize>,
    cond: Condvar,
}

impl WakeSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Adds one permit and wakes a waiter.
    pub(crate) fn notify(&self) {
        let mut permits = match self.permits.lock() {
            Ok(p) => p,
            Err(poisoned) => poisoned.into_inner(),
        };
        *permits += 1;
        self.cond.notify_one();
    }

    /// Blocks until a permit is available, then takes it.
    pub(crate) fn wait(&self) -> Result<()> {
        let mut permits = self
            .permits
            .lock()
            .map_err(|e| EventError::LockPoisoned(e.to_string()))?;
        while *permits == 0 {
            permits = self
                .cond
                .wait(permits)
                .map_err(|e| EventError::LockPoisoned(e.to_string()))?;
        }
        *permits -= 1;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn permits(&self) -> usize {
        self.permits.lock().map(|p| *p).unwrap_or(0)
    }
}
