//! Named-event dispatcher for the dcterm terminal client.
//!
//! Every subsystem of the front end talks through one [`EventManager`]:
//! - producer threads (key reader, timer, hashing, hub callbacks) call
//!   [`EventManager::emit`] or [`EventManager::post`]
//! - a single dispatch thread runs [`EventManager::run`] and is the only
//!   thread that executes listeners, so UI state needs no locking of its own
//! - listeners are ordered per event by [`Priority`] bucket, then by
//!   registration order, and may cut their chain short with
//!   [`EmissionContext::stop`]
//!
//! # Example
//!
//! ```
//! use dcterm_events::{args, names, DispatcherConfig, EventManager, Priority};
//! use std::sync::{Arc, Mutex};
//!
//! let manager = EventManager::new(DispatcherConfig::default());
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let s = seen.clone();
//! manager.subscribe(names::COMMAND, Priority::First, move |ctx| {
//!     s.lock().unwrap().push(ctx.arg::<String>(0)?);
//!     Ok(())
//! }).unwrap();
//!
//! let dispatcher = manager.spawn().unwrap();
//! std::thread::spawn({
//!     let manager = manager.clone();
//!     move || manager.emit(names::COMMAND, args!["help"]).unwrap()
//! }).join().unwrap();
//!
//! manager.quit();
//! dispatcher.join().unwrap().unwrap();
//! assert_eq!(*seen.lock().unwrap(), vec!["help".to_string()]);
//! ```

pub mod args;
pub mod async_channel;
pub mod config;
pub mod error;
pub mod manager;
pub mod names;
pub mod priority;
pub mod stats;

mod chain;
mod context;
mod overflow_policy;
mod queue;
mod registry;

pub use args::{Arg, ArgKind, Args, FromArg, IntoArgs, KeyCode, ObjectRef, Task, MAX_ARGS};
pub use async_channel::AsyncChannel;
pub use chain::ListenerId;
pub use config::DispatcherConfig;
pub use context::{Emission, EmissionContext};
pub use error::{EventError, Result};
pub use manager::EventManager;
pub use overflow_policy::OverflowPolicy;
pub use priority::Priority;
pub use registry::{Connection, ScopedConnection};
pub use stats::DispatchStats;
