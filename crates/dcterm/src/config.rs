//! Filesystem locations used by dcterm.
//!
//! ```text
//! ~/.dcterm/
//! └── logs/
//!     └── dcterm.log
//! ```
//!
//! `DCTERM_STATE_DIR` overrides the base directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Environment variable for a custom state directory.
pub const STATE_DIR_ENV: &str = "DCTERM_STATE_DIR";

/// Default state directory name under home.
const DEFAULT_STATE_DIR: &str = ".dcterm";

const LOGS_SUBDIR: &str = "logs";
const LOG_FILE: &str = "dcterm.log";

/// Get the dcterm state directory.
///
/// The state directory is determined by:
/// 1. `DCTERM_STATE_DIR` environment variable if set
/// 2. `~/.dcterm` if home directory is available
/// 3. `.dcterm` in current directory as fallback
pub fn default_state_dir() -> PathBuf {
    std::env::var(STATE_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(DEFAULT_STATE_DIR))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
        })
}

pub fn logs_dir(state_dir: &Path) -> PathBuf {
    state_dir.join(LOGS_SUBDIR)
}

pub fn log_file(state_dir: &Path) -> PathBuf {
    logs_dir(state_dir).join(LOG_FILE)
}

/// Create the log directory if needed and return the log file path.
pub fn ensure_log_file(state_dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(logs_dir(state_dir))?;
    Ok(log_file(state_dir))
}
