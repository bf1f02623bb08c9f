//! Producer threads and their shutdown plumbing.
//!
//! Producers (key reader, timer, hashing jobs) never touch UI state. They
//! only emit events and post closures, and they all watch one [`StopFlag`].

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use dcterm_events::EventError;

use crate::error::{AppError, Result};

/// Shared "shut down now" flag with an interruptible wait.
#[derive(Debug, Clone, Default)]
pub struct StopFlag {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        match self.inner.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn stop(&self) {
        *self.lock() = true;
        self.inner.1.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.lock()
    }

    /// Sleeps for up to `timeout`. Returns `true` as soon as the flag is set.
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut stopped = self.lock();
        while !*stopped {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            stopped = match self.inner.1.wait_timeout(stopped, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }
}

/// Maps the outcome of an `emit` or `post` for a producer loop.
///
/// `Ok(false)` means the dispatcher has closed and the producer should wind
/// down quietly.
pub fn still_open(result: dcterm_events::Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(EventError::Closed) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// A named producer thread.
#[derive(Debug)]
pub struct Producer {
    name: String,
    handle: JoinHandle<Result<()>>,
}

impl Producer {
    pub fn spawn<F>(name: impl Into<String>, body: F) -> Result<Self>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let name = name.into();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(body)
            .map_err(|e| AppError::Thread(format!("{}: {}", name, e)))?;
        debug!(producer = %name, "producer started");
        Ok(Self { name, handle })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn join(self) -> Result<()> {
        let result = self
            .handle
            .join()
            .map_err(|_| AppError::Thread(format!("{} panicked", self.name)))?;
        debug!(producer = %self.name, ok = result.is_ok(), "producer joined");
        result
    }
}

/// Producers started during a session, joined together at shutdown.
#[derive(Debug, Clone, Default)]
pub struct Workers {
    producers: Arc<Mutex<Vec<Producer>>>,
}

impl Workers {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Producer>> {
        match self.producers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn add(&self, producer: Producer) {
        let mut producers = self.lock();
        // Drop handles of producers that already exited.
        let (done, running): (Vec<_>, Vec<_>) =
            producers.drain(..).partition(Producer::is_finished);
        *producers = running;
        drop(producers);
        for finished in done {
            if let Err(e) = finished.join() {
                warn!(error = %e, "producer failed");
            }
        }
        self.lock().push(producer);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Joins every producer. Returns the first failure after all have been
    /// joined.
    pub fn join_all(&self) -> Result<()> {
        let producers: Vec<_> = self.lock().drain(..).collect();
        let mut first_error = None;
        for producer in producers {
            let name = producer.name().to_string();
            if let Err(e) = producer.join() {
                warn!(producer = %name, error = %e, "producer failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
