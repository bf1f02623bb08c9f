//! Per-object "run this on the dispatch thread" handle.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::args::{Arg, Task};
use crate::error::Result;
use crate::manager::EventManager;
use crate::names;
use crate::priority::Priority;
use crate::registry::ScopedConnection;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(0);

/// A private event with a single listener that runs the closure it carries.
///
/// Objects living on a producer thread (a timer, a hashing job, a hub
/// connection) keep one of these to hand state changes over to the dispatch
/// thread. Each channel gets an id from a process-wide counter, so two
/// channels never share an event name.
///
/// Closures posted through one channel from one thread run in the order they
/// were posted. Dropping the channel disconnects its listener; closures still
/// queued at that point are discarded unrun.
#[derive(Debug)]
pub struct AsyncChannel {
    manager: EventManager,
    id: u64,
    event: String,
    _connection: ScopedConnection,
}

impl AsyncChannel {
    pub fn new(manager: &EventManager) -> Result<Self> {
        let id = NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed);
        let event = names::async_event(id);

        let connection = manager.subscribe(&event, Priority::DEFAULT, |ctx| {
            let task = ctx.arg::<&Task>(0)?;
            task.run();
            Ok(())
        })?;

        trace!(channel = id, "async channel opened");
        Ok(Self {
            manager: manager.clone(),
            id,
            event,
            _connection: connection.scoped(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Name of the private event.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Schedules `f` to run once on the dispatch thread. Callable from any
    /// thread.
    pub fn post<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.manager.emit(self.event.as_str(), Arg::task(f))
    }
}
