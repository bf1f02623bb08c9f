//! Emissions and the per-dispatch context handed to listeners.

use std::any::Any;
use std::sync::Arc;

use crate::args::{Arg, ArgKind, Args, FromArg};
use crate::error::{EventError, Result};
use crate::manager::EventManager;

/// One firing of an event: its name and an argument snapshot.
#[derive(Debug, Clone)]
pub struct Emission {
    name: String,
    args: Args,
}

impl Emission {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Args::new(),
        }
    }

    pub fn with_args(name: impl Into<String>, args: Args) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &Args {
        &self.args
    }
}

/// The current emission, as seen by the listener being called.
///
/// Only the dispatch thread ever builds one, and only for the duration of a
/// single emission's chain. It carries the cancellation flag the dispatch
/// loop polls after each listener returns.
pub struct EmissionContext<'a> {
    manager: &'a EventManager,
    emission: &'a Emission,
    stopped: bool,
}

impl<'a> EmissionContext<'a> {
    pub(crate) fn new(manager: &'a EventManager, emission: &'a Emission) -> Self {
        Self {
            manager,
            emission,
            stopped: false,
        }
    }

    /// Name of the event being dispatched.
    pub fn name(&self) -> &str {
        self.emission.name()
    }

    /// Number of positional arguments.
    pub fn arg_count(&self) -> usize {
        self.emission.args().len()
    }

    /// Positional argument `index` read as `T`.
    ///
    /// Fails with `IndexOutOfRange` past the last argument and `TypeMismatch`
    /// when the stored kind is not the one `T` reads.
    pub fn arg<'s, T: FromArg<'s>>(&'s self, index: usize) -> Result<T> {
        self.emission.args().get_as(index)
    }

    /// Positional argument `index` without a kind check.
    pub fn arg_raw(&self, index: usize) -> Result<&Arg> {
        self.emission.args().get(index)
    }

    /// Downcasts an object argument to its concrete type.
    pub fn object<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>> {
        let obj = self.arg::<&crate::args::ObjectRef>(index)?;
        obj.downcast::<T>().ok_or(EventError::TypeMismatch {
            index,
            expected: ArgKind::Object,
            found: ArgKind::Object,
        })
    }

    pub fn args(&self) -> &Args {
        self.emission.args()
    }

    /// Skips every remaining listener of this emission. Queued emissions are
    /// not affected.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// The manager dispatching this emission, for emitting, posting or
    /// subscribing from inside a listener.
    pub fn manager(&self) -> &EventManager {
        self.manager
    }
}
