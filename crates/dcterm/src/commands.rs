//! Slash commands typed on the input line.
//!
//! `/name a b` is emitted twice: once as [`names::COMMAND`] with the name as
//! argument 0, then as `"command name"` with just `a b`. Listeners pick
//! whichever form suits them.

use std::sync::Arc;

use tracing::{debug, info};

use dcterm_events::{
    names, Arg, Args, EmissionContext, EventError, EventManager, Priority, MAX_ARGS,
};

use crate::error::Result;
use crate::hashing::{self, HashJob};
use crate::producer::{StopFlag, Workers};
use crate::window::{self, Window};

/// Size of a `/hash` job when none is given, in KiB.
pub const DEFAULT_HASH_KIB: u64 = 1024;

/// Built-in commands with their one-line help.
pub const BUILTINS: &[(&str, &str)] = &[
    ("help", "list commands"),
    ("echo", "print the arguments"),
    ("stats", "show dispatcher counters"),
    ("hash", "hash a simulated file: /hash [KiB]"),
    ("quit", "exit dcterm"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
}

/// Parses `/name arg...`. Returns `None` for plain text and a bare `/`.
pub fn parse(line: &str) -> Option<ParsedCommand> {
    let rest = line.trim().strip_prefix('/')?;
    let mut words = rest.split_whitespace();
    let name = words.next()?.to_lowercase();
    Some(ParsedCommand {
        name,
        args: words.map(str::to_string).collect(),
    })
}

/// Emits both forms of a parsed command.
pub fn emit(manager: &EventManager, command: &ParsedCommand) -> Result<()> {
    // The generic form spends one slot on the name.
    if command.args.len() + 1 > MAX_ARGS {
        return Err(EventError::TooManyArgs(command.args.len() + 1).into());
    }
    let mut generic = Args::new();
    generic.push(command.name.as_str())?;
    for arg in &command.args {
        generic.push(arg.as_str())?;
    }
    let specific: Vec<Arg> = command.args.iter().map(Arg::from).collect();

    debug!(command = %command.name, args = command.args.len(), "command entered");
    manager.emit(names::COMMAND, generic)?;
    manager.emit(names::command_event(&command.name), specific)?;
    Ok(())
}

/// Collects every argument of the current emission as text.
fn string_args(ctx: &EmissionContext<'_>) -> dcterm_events::Result<Vec<String>> {
    (0..ctx.arg_count())
        .map(|i| ctx.arg::<String>(i))
        .collect()
}

/// Shared state the built-in commands act on.
#[derive(Debug, Clone)]
pub struct CommandEnv {
    pub window: Arc<Window>,
    pub stop: StopFlag,
    pub workers: Workers,
}

/// Bytes to hash for `/hash [KiB]`. The result always fits an `i64`
/// progress argument.
pub fn hash_bytes(arg: Option<&str>) -> std::result::Result<u64, String> {
    let kib = match arg {
        None => DEFAULT_HASH_KIB,
        Some(text) => text.parse::<u64>().map_err(|e| format!("/hash: {}", e))?,
    };
    kib.checked_mul(1024)
        .filter(|bytes| *bytes <= i64::MAX as u64)
        .ok_or_else(|| "/hash: size too large".to_string())
}

/// Subscribes the built-in commands and the unknown-command fallback.
///
/// Listeners keep the window weakly; see [`window::upgrade`].
pub fn register_builtins(manager: &EventManager, env: &CommandEnv) -> Result<()> {
    let weak = Arc::downgrade(&env.window);
    manager.on(&names::command_event("help"), move |ctx| {
        let window = window::upgrade(&weak)?;
        window.add_line("commands:");
        for (name, help) in BUILTINS {
            window.add_line(format!("  /{:<6} {}", name, help));
        }
        window.notify_updated(ctx.manager()).map_err(EventError::listener)
    })?;

    let weak = Arc::downgrade(&env.window);
    manager.on(&names::command_event("echo"), move |ctx| {
        let window = window::upgrade(&weak)?;
        window.add_line(string_args(ctx)?.join(" "));
        window.notify_updated(ctx.manager()).map_err(EventError::listener)
    })?;

    let weak = Arc::downgrade(&env.window);
    manager.on(&names::command_event("stats"), move |ctx| {
        let window = window::upgrade(&weak)?;
        let stats = ctx.manager().stats();
        window.add_line(format!(
            "emitted {} posted {} dispatched {} jobs {} failures {} stopped {} rejected {} pending {}",
            stats.emitted,
            stats.posted,
            stats.dispatched,
            stats.jobs_run,
            stats.failures,
            stats.stopped,
            stats.rejected,
            ctx.manager().pending()
        ));
        window.notify_updated(ctx.manager()).map_err(EventError::listener)
    })?;

    let weak = Arc::downgrade(&env.window);
    let stop = env.stop.clone();
    let workers = env.workers.clone();
    manager.on(&names::command_event("hash"), move |ctx| {
        let window = window::upgrade(&weak)?;
        let arg = match ctx.arg_count() {
            0 => None,
            _ => Some(ctx.arg::<&str>(0)?),
        };
        let bytes = match hash_bytes(arg) {
            Ok(bytes) => bytes,
            Err(message) => {
                window.add_line(message.as_str());
                window
                    .notify_updated(ctx.manager())
                    .map_err(EventError::listener)?;
                return Err(EventError::Listener(message));
            }
        };

        let file = format!("share-{}k.bin", bytes / 1024);
        window.add_line(format!("hashing {}", file));
        let producer = hashing::spawn(
            ctx.manager().clone(),
            window.clone(),
            HashJob::new(file, bytes),
            stop.clone(),
        )
        .map_err(EventError::listener)?;
        workers.add(producer);
        window.notify_updated(ctx.manager()).map_err(EventError::listener)
    })?;

    let stop = env.stop.clone();
    manager.on(&names::command_event("quit"), move |ctx| {
        info!("quit requested");
        stop.stop();
        ctx.manager().quit();
        Ok(())
    })?;

    let weak = Arc::downgrade(&env.window);
    manager.subscribe(names::COMMAND, Priority::Last, move |ctx| {
        let name = ctx.arg::<&str>(0)?;
        if ctx.manager().listener_count(&names::command_event(name)) > 0 {
            return Ok(());
        }
        let window = window::upgrade(&weak)?;
        window.add_line(format!("unknown command: /{} (try /help)", name));
        window.notify_updated(ctx.manager()).map_err(EventError::listener)
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcterm_events::DispatcherConfig;

    fn make_env(manager: &EventManager) -> CommandEnv {
        CommandEnv {
            window: Window::new(manager, "test").unwrap(),
            stop: StopFlag::new(),
            workers: Workers::new(),
        }
    }

    fn run_line(manager: &EventManager, line: &str) {
        emit(manager, &parse(line).unwrap()).unwrap();
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            parse("  /Hash 512 extra "),
            Some(ParsedCommand {
                name: "hash".to_string(),
                args: vec!["512".to_string(), "extra".to_string()],
            })
        );
        assert_eq!(parse("/quit").unwrap().args, Vec::<String>::new());
        assert_eq!(parse("hello"), None);
        assert_eq!(parse("/"), None);
        assert_eq!(parse("/   "), None);
    }

    #[test]
    fn test_emit_rejects_too_many_args() {
        let manager = EventManager::new(DispatcherConfig::default());
        let command = parse("/echo 1 2 3 4 5 6 7").unwrap();
        let err = emit(&manager, &command).unwrap_err();
        assert!(matches!(
            err,
            crate::error::AppError::Events(EventError::TooManyArgs(8))
        ));
        assert_eq!(manager.pending(), 0);
    }

    #[test]
    fn test_echo_and_unknown_command() {
        let manager = EventManager::new(DispatcherConfig::default());
        let env = make_env(&manager);
        register_builtins(&manager, &env).unwrap();

        run_line(&manager, "/echo hello world");
        run_line(&manager, "/nope");
        manager.quit();
        manager.run().unwrap();

        let lines: Vec<_> = env.window.snapshot().lines.into_iter().collect();
        assert_eq!(
            lines,
            vec![
                "hello world".to_string(),
                "unknown command: /nope (try /help)".to_string()
            ]
        );
    }

    #[test]
    fn test_help_lists_builtins() {
        let manager = EventManager::new(DispatcherConfig::default());
        let env = make_env(&manager);
        register_builtins(&manager, &env).unwrap();

        run_line(&manager, "/help");
        manager.quit();
        manager.run().unwrap();

        let lines = env.window.snapshot().lines;
        assert_eq!(lines.len(), BUILTINS.len() + 1);
        assert!(lines.iter().any(|l| l.contains("/quit")));
    }

    #[test]
    fn test_quit_command_stops_everything() {
        let manager = EventManager::new(DispatcherConfig::default());
        let env = make_env(&manager);
        register_builtins(&manager, &env).unwrap();
        let dispatcher = manager.spawn().unwrap();

        run_line(&manager, "/quit");
        dispatcher.join().unwrap().unwrap();

        assert!(env.stop.is_stopped());
        assert!(manager.is_closed());
    }

    #[test]
    fn test_hash_command_runs_job() {
        let manager = EventManager::new(DispatcherConfig::default());
        let env = make_env(&manager);
        register_builtins(&manager, &env).unwrap();
        let dispatcher = manager.spawn().unwrap();

        run_line(&manager, "/hash 64");
        // Wait for the job to be registered before joining it.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        while env.workers.is_empty() && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        env.workers.join_all().unwrap();
        manager.quit();
        dispatcher.join().unwrap().unwrap();

        let lines = env.window.snapshot().lines;
        assert_eq!(lines[0], "hashing share-64k.bin");
        assert!(lines[1].starts_with("hashed share-64k.bin (65536 bytes)"));
    }

    #[test]
    fn test_hash_bytes() {
        assert_eq!(hash_bytes(None), Ok(DEFAULT_HASH_KIB * 1024));
        assert_eq!(hash_bytes(Some("64")), Ok(65536));
        assert!(hash_bytes(Some("abc")).unwrap_err().starts_with("/hash: "));
        // 2^53 KiB is 2^63 bytes, one past i64::MAX.
        assert_eq!(
            hash_bytes(Some("9007199254740992")),
            Err("/hash: size too large".to_string())
        );
        // 2^54 KiB does not fit a u64 at all.
        assert_eq!(
            hash_bytes(Some("18014398509481984")),
            Err("/hash: size too large".to_string())
        );
    }

    #[test]
    fn test_hash_command_rejects_oversized_job() {
        let manager = EventManager::new(DispatcherConfig::default());
        let env = make_env(&manager);
        register_builtins(&manager, &env).unwrap();

        run_line(&manager, "/hash 18014398509481984");
        manager.quit();
        manager.run().unwrap();

        let lines: Vec<_> = env.window.snapshot().lines.into_iter().collect();
        assert_eq!(lines, vec!["/hash: size too large".to_string()]);
        assert!(env.workers.is_empty());
        assert_eq!(manager.stats().failures, 1);
    }

    #[test]
    fn test_listeners_do_not_keep_window_alive() {
        let manager = EventManager::new(DispatcherConfig::default());
        let env = make_env(&manager);
        register_builtins(&manager, &env).unwrap();
        let weak = Arc::downgrade(&env.window);

        drop(env);
        assert!(weak.upgrade().is_none());
    }
}
