//! Listener chain - the ordered callbacks of one event.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::context::EmissionContext;
use crate::error::Result;
use crate::priority::Priority;

/// Callback signature of a listener.
pub type ListenerFn = dyn Fn(&mut EmissionContext<'_>) -> Result<()> + Send + Sync;

/// Monotonic registration sequence number, unique per manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub(crate) u64);

impl ListenerId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One registered listener.
pub(crate) struct ListenerEntry {
    pub(crate) id: ListenerId,
    pub(crate) priority: Priority,
    pub(crate) callback: Arc<ListenerFn>,
    removed: AtomicBool,
}

impl ListenerEntry {
    pub(crate) fn new(id: ListenerId, priority: Priority, callback: Arc<ListenerFn>) -> Self {
        Self {
            id,
            priority,
            callback,
            removed: AtomicBool::new(false),
        }
    }

    pub(crate) fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_removed(&self) {
        self.removed.store(true, Ordering::Release);
    }
}

impl fmt::Debug for ListenerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerEntry")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("removed", &self.is_removed())
            .finish()
    }
}

/// Ordered listeners of a single event.
///
/// Kept as three buckets so insertion never has to re-sort the whole chain:
///
/// - `first`: priority `First`, registration order
/// - `numeric`: sorted by level, registration order within a level
/// - `last`: priority `Last`, registration order
///
/// Dispatch never iterates the live buckets. It takes a [`snapshot`] and
/// checks each entry's removal flag before calling it, so listeners may
/// disconnect themselves or each other mid-dispatch.
///
/// [`snapshot`]: ListenerChain::snapshot
#[derive(Debug, Default)]
pub(crate) struct ListenerChain {
    first: Vec<Arc<ListenerEntry>>,
    numeric: Vec<Arc<ListenerEntry>>,
    last: Vec<Arc<ListenerEntry>>,
}

impl ListenerChain {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, entry: Arc<ListenerEntry>) {
        match entry.priority {
            Priority::First => self.first.push(entry),
            Priority::Last => self.last.push(entry),
            Priority::Level(level) => {
                // Insert after every entry with the same or a lower level.
                let at = self.numeric.partition_point(|e| match e.priority {
                    Priority::Level(l) => l <= level,
                    _ => true,
                });
                self.numeric.insert(at, entry);
            }
        }
    }

    /// Removes a listener from the live buckets. Returns whether it was found.
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        for bucket in [&mut self.first, &mut self.numeric, &mut self.last] {
            if let Some(pos) = bucket.iter().position(|e| e.id == id) {
                let entry = bucket.remove(pos);
                entry.mark_removed();
                return true;
            }
        }
        false
    }

    /// Listeners in dispatch order.
    pub(crate) fn snapshot(&self) -> Vec<Arc<ListenerEntry>> {
        self.first
            .iter()
            .chain(self.numeric.iter())
            .chain(self.last.iter())
            .cloned()
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.first.len() + self.numeric.len() + self.last.len()
    }
}
