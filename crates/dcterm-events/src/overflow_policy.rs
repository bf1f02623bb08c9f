use std::fmt;
use std::str::FromStr;

/// What `emit` and `post` do when the dispatch queue is at capacity.
///
/// No policy drops an emission silently: it is either delivered or the
/// producer gets an error back.
///
/// | Policy | On full queue |
/// |--------|---------------|
/// | [`Block`](Self::Block) | Producer waits until the dispatch thread frees a slot |
/// | [`Grow`](Self::Grow) | Queue grows past its capacity |
/// | [`Reject`](Self::Reject) | `EventError::QueueOverflow` is returned |
///
/// A listener that emits while the queue is full would wait on itself under
/// `Block`, so emissions made from the dispatch thread always use `Grow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OverflowPolicy {
    #[default]
    Block,
    Grow,
    Reject,
}

impl OverflowPolicy {
    pub fn is_block(&self) -> bool {
        matches!(self, OverflowPolicy::Block)
    }

    pub fn is_grow(&self) -> bool {
        matches!(self, OverflowPolicy::Grow)
    }

    pub fn is_reject(&self) -> bool {
        matches!(self, OverflowPolicy::Reject)
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Block => write!(f, "block"),
            OverflowPolicy::Grow => write!(f, "grow"),
            OverflowPolicy::Reject => write!(f, "reject"),
        }
    }
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "block" => Ok(OverflowPolicy::Block),
            "grow" => Ok(OverflowPolicy::Grow),
            "reject" => Ok(OverflowPolicy::Reject),
            other => Err(format!("unknown overflow policy: {}", other)),
        }
    }
}
