//! Interactive session wiring.
//!
//! Everything that touches the window runs as a listener on the dispatch
//! thread. Producer threads only emit.

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use crossterm::{
    cursor::Show,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use tracing::{info, warn};

use dcterm_events::{
    names, DispatcherConfig, EmissionContext, EventError, EventManager, KeyCode, Priority,
};

use crate::commands::{self, CommandEnv};
use crate::error::Result;
use crate::hashing;
use crate::input::{self, CTRL_C};
use crate::producer::{StopFlag, Workers};
use crate::timer;
use crate::window::{self, Screen, Window};

/// Events every session declares up front.
const DECLARED_EVENTS: &[&str] = &[
    names::COMMAND,
    names::KEY_PRESSED,
    names::WINDOW_UPDATED,
    names::WINDOW_STATUS_UPDATED,
    names::TIMER_SECOND,
    names::HASH_PROGRESS,
];

/// Raw mode and the alternate screen, restored on drop.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            warn!(error = %e, "failed to leave raw mode");
        }
        if let Err(e) = execute!(io::stdout(), LeaveAlternateScreen, Show) {
            warn!(error = %e, "failed to leave alternate screen");
        }
    }
}

pub struct App {
    manager: EventManager,
    env: CommandEnv,
    tick: Duration,
}

impl App {
    /// Builds a session: declares its events and subscribes every listener
    /// except the screen renderer, which [`App::run`] attaches once the
    /// terminal is set up.
    pub fn new(config: DispatcherConfig, tick: Duration) -> Result<Self> {
        let manager = EventManager::new(config);
        for name in DECLARED_EVENTS {
            manager.declare(name)?;
        }

        let env = CommandEnv {
            window: Window::new(&manager, "dcterm")?,
            stop: StopFlag::new(),
            workers: Workers::new(),
        };
        commands::register_builtins(&manager, &env)?;
        attach_line_editor(&manager, &env)?;
        attach_status(&manager, &env.window)?;

        Ok(Self { manager, env, tick })
    }

    pub fn manager(&self) -> &EventManager {
        &self.manager
    }

    pub fn window(&self) -> &Arc<Window> {
        &self.env.window
    }

    pub fn stop_flag(&self) -> &StopFlag {
        &self.env.stop
    }

    /// Runs the session on the calling thread until `/quit` or Ctrl-C.
    ///
    /// Shutdown order: the dispatch loop drains and returns, the producers
    /// are stopped and joined, then the terminal is restored.
    pub fn run(self) -> Result<()> {
        let _terminal = TerminalGuard::enter()?;
        let screen = Screen::new(CrosstermBackend::new(io::stdout()))?;
        attach_screen(&self.manager, Arc::new(screen))?;

        let terminate = input::setup_signal_handler()?;
        let stop = &self.env.stop;
        self.env
            .workers
            .add(input::spawn(self.manager.clone(), stop.clone(), terminate)?);
        self.env
            .workers
            .add(timer::spawn(self.manager.clone(), self.tick, stop.clone())?);

        let window = &self.env.window;
        window.add_line(format!(
            "dcterm {} - type /help for commands",
            env!("CARGO_PKG_VERSION")
        ));
        window.notify_updated(&self.manager)?;

        info!("session started");
        let result = self.manager.run();
        stop.stop();
        let joined = self.env.workers.join_all();
        info!(stats = ?self.manager.stats(), "session finished");

        result?;
        joined
    }
}

fn attach_line_editor(manager: &EventManager, env: &CommandEnv) -> Result<()> {
    let weak = Arc::downgrade(&env.window);
    let stop = env.stop.clone();
    manager.on(names::KEY_PRESSED, move |ctx| {
        let code = ctx.arg::<KeyCode>(1)?;
        if code == CTRL_C {
            info!("interrupted");
            stop.stop();
            ctx.manager().quit();
            return Ok(());
        }

        let window = window::upgrade(&weak)?;
        match code {
            KeyCode::ENTER => submit(ctx, &window),
            KeyCode::BACKSPACE => {
                window.pop_input();
            }
            KeyCode::ESCAPE => {
                window.take_input();
            }
            _ => window.push_input(ctx.arg::<&str>(0)?),
        }
        window.notify_updated(ctx.manager()).map_err(EventError::listener)
    })?;
    Ok(())
}

fn submit(ctx: &EmissionContext<'_>, window: &Window) {
    let line = window.take_input();
    match commands::parse(&line) {
        Some(command) => {
            if let Err(e) = commands::emit(ctx.manager(), &command) {
                window.add_line(format!("error: {}", e));
            }
        }
        None if !line.trim().is_empty() => window.add_line(line),
        None => {}
    }
}

/// Status line text shown by the timer listener.
pub fn status_line(now: DateTime<Local>, ticks: i64, pending: usize) -> String {
    format!(
        "{}  up {}s  queue {}",
        now.format("%H:%M:%S"),
        ticks,
        pending
    )
}

fn attach_status(manager: &EventManager, window: &Arc<Window>) -> Result<()> {
    let weak = Arc::downgrade(window);
    manager.on(names::TIMER_SECOND, move |ctx| {
        let ticks = ctx.arg::<i64>(0)?;
        let clock = window::upgrade(&weak)?;
        clock.set_status(status_line(Local::now(), ticks, ctx.manager().pending()));
        clock
            .notify_status(ctx.manager())
            .map_err(EventError::listener)
    })?;

    let weak = Arc::downgrade(window);
    manager.on(names::HASH_PROGRESS, move |ctx| {
        let progress = window::upgrade(&weak)?;
        let file = ctx.arg::<&str>(0)?;
        let done = ctx.arg::<i64>(1)?;
        let total = ctx.arg::<i64>(2)?;
        progress.set_status(format!("hashing {} {}", file, hashing::percent(done, total)));
        progress
            .notify_status(ctx.manager())
            .map_err(EventError::listener)
    })?;
    Ok(())
}

fn attach_screen(
    manager: &EventManager,
    screen: Arc<Screen<CrosstermBackend<Stdout>>>,
) -> Result<()> {
    for name in [names::WINDOW_UPDATED, names::WINDOW_STATUS_UPDATED] {
        let screen = screen.clone();
        manager.subscribe(name, Priority::Last, move |ctx| {
            let target = ctx.object::<Window>(0)?;
            screen.render(&target).map_err(EventError::listener)
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcterm_events::args;

    fn make_app() -> App {
        App::new(DispatcherConfig::default(), Duration::from_millis(10)).unwrap()
    }

    fn type_text(manager: &EventManager, text: &str) {
        for c in text.chars() {
            manager
                .emit(names::KEY_PRESSED, args![c.to_string(), KeyCode::from(c)])
                .unwrap();
        }
    }

    fn press(manager: &EventManager, code: KeyCode) {
        manager.emit(names::KEY_PRESSED, args!["", code]).unwrap();
    }

    #[test]
    fn test_new_declares_events() {
        let app = make_app();
        for name in DECLARED_EVENTS {
            assert!(app.manager().contains(name));
        }
        assert_eq!(
            app.manager().declare(names::COMMAND),
            Err(EventError::AlreadyExists(names::COMMAND.to_string()))
        );
    }

    #[test]
    fn test_typed_command_runs() {
        let app = make_app();
        let manager = app.manager().clone();

        type_text(&manager, "/echx");
        press(&manager, KeyCode::BACKSPACE);
        type_text(&manager, "o hi there");
        press(&manager, KeyCode::ENTER);
        type_text(&manager, "plain text");
        press(&manager, KeyCode::ENTER);
        type_text(&manager, "leftover");
        manager.quit();
        manager.run().unwrap();

        let state = app.window().snapshot();
        assert_eq!(
            state.lines.into_iter().collect::<Vec<_>>(),
            vec!["hi there".to_string(), "plain text".to_string()]
        );
        assert_eq!(state.input, "leftover");
    }

    #[test]
    fn test_ctrl_c_quits() {
        let app = make_app();
        let manager = app.manager().clone();
        let dispatcher = manager.spawn().unwrap();

        press(&manager, CTRL_C);
        dispatcher.join().unwrap().unwrap();

        assert!(app.stop_flag().is_stopped());
        assert!(manager.is_closed());
    }

    #[test]
    fn test_timer_and_progress_update_status() {
        let app = make_app();
        let manager = app.manager().clone();

        manager.emit(names::TIMER_SECOND, args![5]).unwrap();
        manager.quit();
        manager.run().unwrap();
        assert!(app.window().snapshot().status.contains("up 5s"));

        let app = make_app();
        let manager = app.manager().clone();
        manager.emit(names::HASH_PROGRESS, args!["a.bin", 50, 200]).unwrap();
        manager.quit();
        manager.run().unwrap();
        assert_eq!(app.window().snapshot().status, "hashing a.bin 25%");
    }

    #[test]
    fn test_status_line_format() {
        let now = Local::now();
        let line = status_line(now, 42, 3);
        assert!(line.ends_with("up 42s  queue 3"));
        assert_eq!(&line[..8], now.format("%H:%M:%S").to_string());
    }

    #[test]
    fn test_dropping_app_frees_window() {
        let app = make_app();
        let manager = app.manager().clone();
        let window = Arc::downgrade(app.window());
        drop(app);

        assert!(window.upgrade().is_none());
        manager.emit(names::TIMER_SECOND, args![1]).unwrap();
        manager.quit();
        manager.run().unwrap();
        assert_eq!(manager.stats().failures, 1);
    }
}
