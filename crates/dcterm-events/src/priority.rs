//! Listener priority buckets.

use std::fmt;
use std::str::FromStr;

use crate::error::{EventError, Result};

/// Highest numeric priority level.
pub const MAX_LEVEL: u8 = 9;

/// Where a listener sits in its event's chain.
///
/// The derived ordering is the dispatch order: every `First` listener runs
/// before any `Level`, levels run in ascending number, and `Last` listeners
/// run after everything else. Within one bucket, registration order wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    First,
    Level(u8),
    Last,
}

impl Priority {
    /// The conventional default level.
    pub const DEFAULT: Priority = Priority::Level(5);

    /// Creates a numeric priority, rejecting levels above [`MAX_LEVEL`].
    pub fn level(level: u8) -> Result<Self> {
        if level > MAX_LEVEL {
            return Err(EventError::InvalidPriority(level));
        }
        Ok(Priority::Level(level))
    }

    pub fn is_first(&self) -> bool {
        matches!(self, Priority::First)
    }

    pub fn is_last(&self) -> bool {
        matches!(self, Priority::Last)
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::DEFAULT
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::First => write!(f, "first"),
            Priority::Level(n) => write!(f, "{}", n),
            Priority::Last => write!(f, "last"),
        }
    }
}

impl FromStr for Priority {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(Priority::First),
            "last" => Ok(Priority::Last),
            "default" => Ok(Priority::DEFAULT),
            other => {
                let level = other
                    .parse::<u8>()
                    .map_err(|_| EventError::ParsePriority(s.to_string()))?;
                Priority::level(level)
            }
        }
    }
}
