//! Command-line interface definition using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use dcterm_events::config::DEFAULT_QUEUE_CAPACITY;
use dcterm_events::{DispatcherConfig, OverflowPolicy};

use crate::config;

/// Timer period for `dcterm run` when none is given.
pub const DEFAULT_TICK_MS: u64 = 1000;

/// Build version string with git hash and build date.
fn version_string() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("DCTERM_GIT_HASH");
    const BUILD_DATE: &str = env!("DCTERM_BUILD_DATE");

    // Format: "0.1.0 (abc1234, 2026-10-15)"
    static VERSION_STRING: std::sync::OnceLock<String> = std::sync::OnceLock::new();
    VERSION_STRING.get_or_init(|| format!("{} ({}, {})", VERSION, GIT_HASH, BUILD_DATE))
}

/// dcterm - terminal client for Direct Connect hubs
#[derive(Parser, Debug)]
#[command(name = "dcterm")]
#[command(author, version = version_string(), about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to state directory
    #[arg(short, long, env = "DCTERM_STATE_DIR", global = true)]
    pub state_dir: Option<PathBuf>,

    /// Dispatch queue capacity
    #[arg(long, env = "DCTERM_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY, global = true)]
    pub queue_capacity: usize,

    /// What producers do when the queue is full (block, grow, reject)
    #[arg(long, env = "DCTERM_OVERFLOW", default_value = "block", global = true)]
    pub overflow: OverflowPolicy,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the interactive client (default)
    Run {
        /// Timer period in milliseconds
        #[arg(long, default_value_t = DEFAULT_TICK_MS)]
        tick_ms: u64,
    },

    /// Stress the dispatcher from several producer threads
    Bench {
        /// Number of producer threads
        #[arg(short, long, default_value_t = 4)]
        producers: usize,

        /// Emissions per producer
        #[arg(short, long, default_value_t = 10_000)]
        emissions: usize,
    },
}

impl Cli {
    /// Get the state directory, using default if not specified.
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir
            .clone()
            .unwrap_or_else(config::default_state_dir)
    }

    /// Get the log level based on verbosity.
    pub fn log_level(&self) -> tracing::Level {
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig::new()
            .with_queue_capacity(self.queue_capacity)
            .with_overflow_policy(self.overflow)
    }
}
