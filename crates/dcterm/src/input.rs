//! Key reader thread.
//!
//! Reads crossterm key events and turns each into a `"key pressed"` emission
//! carrying the typed text and a raw key code.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode as TermKey, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::{debug, info, trace};

use dcterm_events::{args, names, EventManager, KeyCode};

use crate::error::Result;
use crate::producer::{still_open, Producer, StopFlag};

/// Raw code sent for Ctrl-C.
pub const CTRL_C: KeyCode = KeyCode(3);
/// Raw code sent for Tab.
pub const TAB: KeyCode = KeyCode(9);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Registers SIGTERM and SIGHUP. The returned flag is set when either
/// arrives.
pub fn setup_signal_handler() -> std::io::Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&flag))?;
    #[cfg(unix)]
    signal_hook::flag::register(signal_hook::consts::SIGHUP, Arc::clone(&flag))?;
    Ok(flag)
}

/// Starts the key reader. A raised `terminate` flag is turned into a
/// `"command quit"` emission.
pub fn spawn(
    manager: EventManager,
    stop: StopFlag,
    terminate: Arc<AtomicBool>,
) -> Result<Producer> {
    Producer::spawn("keys", move || run(&manager, &stop, &terminate))
}

fn run(manager: &EventManager, stop: &StopFlag, terminate: &AtomicBool) -> Result<()> {
    while !stop.is_stopped() {
        if terminate.swap(false, Ordering::Relaxed) {
            info!("termination signal received");
            if !still_open(manager.emit(names::command_event("quit"), ()))? {
                break;
            }
        }
        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        let Some((text, code)) = encode_key(&key) else {
            trace!(?key, "unmapped key");
            continue;
        };
        if !still_open(manager.emit(names::KEY_PRESSED, args![text, code]))? {
            break;
        }
    }
    debug!("key reader stopped");
    Ok(())
}

/// Text and raw code for a terminal key. Control keys carry empty text.
pub fn encode_key(key: &KeyEvent) -> Option<(String, KeyCode)> {
    match key.code {
        TermKey::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let code = (c.to_ascii_lowercase() as u32) & 0x1f;
            Some((String::new(), KeyCode(code)))
        }
        TermKey::Char(c) => Some((c.to_string(), KeyCode::from(c))),
        TermKey::Enter => Some((String::new(), KeyCode::ENTER)),
        TermKey::Backspace => Some((String::new(), KeyCode::BACKSPACE)),
        TermKey::Esc => Some((String::new(), KeyCode::ESCAPE)),
        TermKey::Tab => Some(("\t".to_string(), TAB)),
        _ => None,
    }
}
