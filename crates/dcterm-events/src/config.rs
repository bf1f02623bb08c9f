//! Dispatcher configuration.

use crate::overflow_policy::OverflowPolicy;

/// Default dispatch queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default name of the dispatch thread started by `EventManager::spawn`.
pub const DEFAULT_THREAD_NAME: &str = "dispatch";

/// Configuration for an [`EventManager`](crate::EventManager).
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Pending emissions held before the overflow policy applies.
    pub queue_capacity: usize,
    /// What producers experience when the queue is full.
    pub overflow_policy: OverflowPolicy,
    /// Thread name used by `spawn`.
    pub thread_name: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl DispatcherConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the queue capacity. Zero is raised to one.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Sets the overflow policy.
    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Sets the dispatch thread name.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}
