//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins over the `-v` count when it is set.

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()))
}

/// Log to stderr. Used by non-interactive subcommands.
pub fn init_stderr(level: Level) {
    fmt()
        .with_env_filter(env_filter(level))
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Log to `path`, appending. The interactive screen owns the terminal, so
/// nothing may be written to stdout or stderr while it is up.
pub fn init_file(level: Level, path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    fmt()
        .with_env_filter(env_filter(level))
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}
