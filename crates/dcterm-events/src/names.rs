//! Event names shared between producers and the front end.
//!
//! Collaborators agree on these strings; the dispatcher itself treats every
//! name the same way.

/// Generic command event. Argument 0 is the command name, the rest are the
/// command's own arguments.
pub const COMMAND: &str = "command";

/// A key was read. Arguments: UTF-8 text, raw [`KeyCode`](crate::KeyCode).
pub const KEY_PRESSED: &str = "key pressed";

/// A window's content changed. Argument 0 is the window object.
pub const WINDOW_UPDATED: &str = "window updated";

/// A window's status line changed. Argument 0 is the window object.
pub const WINDOW_STATUS_UPDATED: &str = "window status updated";

/// Fired once per second by the timer thread. Argument 0 is the tick count.
pub const TIMER_SECOND: &str = "timer second";

/// Hashing progress. Arguments: file name, bytes done, bytes total.
pub const HASH_PROGRESS: &str = "hash progress";

const COMMAND_PREFIX: &str = "command ";
const ASYNC_PREFIX: &str = "async";

/// Event fired for one specific command, e.g. `"command quit"`.
pub fn command_event(name: &str) -> String {
    format!("{}{}", COMMAND_PREFIX, name)
}

/// Command name carried by a `"command <name>"` event name.
pub fn command_name(event: &str) -> Option<&str> {
    event.strip_prefix(COMMAND_PREFIX).filter(|n| !n.is_empty())
}

/// Private event of the async channel with `id`.
pub fn async_event(id: u64) -> String {
    format!("{}{}", ASYNC_PREFIX, id)
}
