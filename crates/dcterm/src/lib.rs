//! dcterm terminal front end.
//!
//! The binary wires a key reader, a timer and hashing jobs to one
//! [`dcterm_events::EventManager`]. Every screen update happens on the
//! dispatch thread.

pub mod app;
pub mod bench;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod hashing;
pub mod input;
pub mod logging;
pub mod producer;
pub mod timer;
pub mod window;

pub use error::{AppError, Result};
