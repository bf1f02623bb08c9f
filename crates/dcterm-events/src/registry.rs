//! Event registry - maps event names to listener chains.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use tracing::{debug, trace};

use crate::chain::{ListenerChain, ListenerEntry, ListenerFn, ListenerId};
use crate::error::{EventError, Result};
use crate::priority::Priority;

/// Name to chain map.
///
/// Chains are created explicitly by [`declare`](Registry::declare) or lazily
/// on first use, and are never removed. The map sits behind its own `RwLock`,
/// independent of the dispatch queue, so subscription is safe from any
/// thread and from inside a running listener.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    chains: RwLock<HashMap<String, ListenerChain>>,
    next_id: AtomicU64,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn declare(&self, name: &str) -> Result<()> {
        let mut chains = self
            .chains
            .write()
            .map_err(|e| EventError::LockPoisoned(e.to_string()))?;

        if chains.contains_key(name) {
            return Err(EventError::AlreadyExists(name.to_string()));
        }
        chains.insert(name.to_string(), ListenerChain::new());
        debug!(event = %name, "declared event");
        Ok(())
    }

    /// Creates the chain for `name` if it does not exist yet.
    pub(crate) fn ensure(&self, name: &str) -> Result<()> {
        if self.contains(name) {
            return Ok(());
        }
        let mut chains = self
            .chains
            .write()
            .map_err(|e| EventError::LockPoisoned(e.to_string()))?;
        chains.entry(name.to_string()).or_insert_with(|| {
            trace!(event = %name, "created event lazily");
            ListenerChain::new()
        });
        Ok(())
    }

    pub(crate) fn subscribe(
        self: &Arc<Self>,
        name: &str,
        priority: Priority,
        callback: Arc<ListenerFn>,
    ) -> Result<Connection> {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = Arc::new(ListenerEntry::new(id, priority, callback));

        let mut chains = self
            .chains
            .write()
            .map_err(|e| EventError::LockPoisoned(e.to_string()))?;
        chains
            .entry(name.to_string())
            .or_insert_with(ListenerChain::new)
            .insert(Arc::clone(&entry));

        debug!(event = %name, listener = %id, %priority, "listener connected");

        Ok(Connection {
            event: name.to_string(),
            id,
            entry: Arc::downgrade(&entry),
            registry: Arc::downgrade(self),
        })
    }

    fn disconnect(&self, name: &str, id: ListenerId) -> bool {
        let mut chains = match self.chains.write() {
            Ok(chains) => chains,
            Err(poisoned) => poisoned.into_inner(),
        };
        let removed = chains
            .get_mut(name)
            .map(|chain| chain.remove(id))
            .unwrap_or(false);
        if removed {
            debug!(event = %name, listener = %id, "listener disconnected");
        }
        removed
    }

    /// Listeners of `name` in dispatch order. Empty if the event is unknown.
    pub(crate) fn snapshot(&self, name: &str) -> Result<Vec<Arc<ListenerEntry>>> {
        let chains = self
            .chains
            .read()
            .map_err(|e| EventError::LockPoisoned(e.to_string()))?;
        Ok(chains.get(name).map(|c| c.snapshot()).unwrap_or_default())
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.chains
            .read()
            .map(|chains| chains.contains_key(name))
            .unwrap_or(false)
    }

    pub(crate) fn listener_count(&self, name: &str) -> usize {
        self.chains
            .read()
            .ok()
            .and_then(|chains| chains.get(name).map(|c| c.len()))
            .unwrap_or(0)
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .chains
            .read()
            .map(|chains| chains.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

/// Handle to a registered listener.
///
/// Dropping a `Connection` does not disconnect it; call
/// [`disconnect`](Connection::disconnect) before the state the listener
/// captures goes away, or convert it with [`scoped`](Connection::scoped).
#[derive(Debug, Clone)]
pub struct Connection {
    event: String,
    id: ListenerId,
    entry: Weak<ListenerEntry>,
    registry: Weak<Registry>,
}

impl Connection {
    /// Name of the event this listener is attached to.
    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Removes the listener. Safe to call more than once and from inside a
    /// running listener; an in-flight dispatch skips it from then on.
    pub fn disconnect(&self) {
        if let Some(entry) = self.entry.upgrade() {
            entry.mark_removed();
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.disconnect(&self.event, self.id);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.entry
            .upgrade()
            .map(|e| !e.is_removed())
            .unwrap_or(false)
    }

    /// Wraps the connection so it disconnects when dropped.
    pub fn scoped(self) -> ScopedConnection {
        ScopedConnection(self)
    }
}

/// A [`Connection`] that disconnects on drop.
#[derive(Debug)]
pub struct ScopedConnection(Connection);

impl ScopedConnection {
    pub fn connection(&self) -> &Connection {
        &self.0
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        self.0.disconnect();
    }
}
