//! EventManager - named events dispatched on a single thread.
//!
//! Concurrency layout:
//! - `DispatchQueue` + `WakeSignal`: the only state producers touch
//! - `Registry` behind its own `RwLock`: subscriptions from any thread
//! - everything a listener does runs on the one thread inside [`EventManager::run`]

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};

use tracing::{debug, error, info, trace, warn};

use crate::args::IntoArgs;
use crate::config::DispatcherConfig;
use crate::context::{Emission, EmissionContext};
use crate::error::{EventError, Result};
use crate::priority::Priority;
use crate::queue::{DispatchQueue, Job, Pending, WakeSignal};
use crate::registry::{Connection, Registry};
use crate::stats::{Counters, DispatchStats};

struct Inner {
    config: DispatcherConfig,
    registry: Arc<Registry>,
    queue: DispatchQueue,
    wake: WakeSignal,
    quit: AtomicBool,
    dispatch_thread: Mutex<Option<ThreadId>>,
    counters: Counters,
}

/// Named-event dispatcher with one consumer thread.
///
/// # Threading
///
/// - **Producers** (any thread) call [`emit`](Self::emit) and
///   [`post`](Self::post). Both enqueue and return; neither runs a listener.
/// - **The dispatch thread** is whichever thread calls [`run`](Self::run)
///   (or the one started by [`spawn`](Self::spawn)). Every listener and every
///   posted closure runs there, one at a time, in global enqueue order.
///
/// `EventManager` is a cheap handle; clone it into every component that
/// emits or subscribes instead of reaching for a global.
///
/// # Example
///
/// ```
/// use dcterm_events::{args, DispatcherConfig, EventManager, Priority};
/// use std::sync::atomic::{AtomicI64, Ordering};
/// use std::sync::Arc;
///
/// let manager = EventManager::new(DispatcherConfig::default());
/// let total = Arc::new(AtomicI64::new(0));
///
/// let t = total.clone();
/// manager.subscribe("hash progress", Priority::DEFAULT, move |ctx| {
///     t.fetch_add(ctx.arg::<i64>(0)?, Ordering::SeqCst);
///     Ok(())
/// }).unwrap();
///
/// let dispatcher = manager.spawn().unwrap();
/// manager.emit("hash progress", args![40]).unwrap();
/// manager.emit("hash progress", args![2]).unwrap();
/// manager.quit();
/// dispatcher.join().unwrap().unwrap();
///
/// assert_eq!(total.load(Ordering::SeqCst), 42);
/// ```
#[derive(Clone)]
pub struct EventManager {
    inner: Arc<Inner>,
}

impl EventManager {
    /// Creates a manager. Nothing is dispatched until [`run`](Self::run) or
    /// [`spawn`](Self::spawn) is called.
    pub fn new(config: DispatcherConfig) -> Self {
        let queue = DispatchQueue::new(config.queue_capacity, config.overflow_policy);
        Self {
            inner: Arc::new(Inner {
                config,
                registry: Arc::new(Registry::new()),
                queue,
                wake: WakeSignal::new(),
                quit: AtomicBool::new(false),
                dispatch_thread: Mutex::new(None),
                counters: Counters::default(),
            }),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    /// Creates an empty chain for `name`.
    ///
    /// Fails with `AlreadyExists` if the event is already known, including
    /// when it was created implicitly by an earlier `emit` or `subscribe`.
    pub fn declare(&self, name: &str) -> Result<()> {
        self.inner.registry.declare(name)
    }

    /// Registers a listener at `priority`, creating the event if needed.
    ///
    /// Callable from any thread, including from inside a running listener.
    /// A listener added during a dispatch first fires on the next emission.
    pub fn subscribe<F>(&self, name: &str, priority: Priority, listener: F) -> Result<Connection>
    where
        F: Fn(&mut EmissionContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.inner
            .registry
            .subscribe(name, priority, Arc::new(listener))
    }

    /// Registers a listener at the default priority.
    pub fn on<F>(&self, name: &str, listener: F) -> Result<Connection>
    where
        F: Fn(&mut EmissionContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.subscribe(name, Priority::DEFAULT, listener)
    }

    /// Queues an emission of `name` and returns without waiting for it.
    ///
    /// Unknown events are created on the fly. When the queue is full the
    /// configured [`OverflowPolicy`](crate::OverflowPolicy) decides between
    /// waiting, growing and `QueueOverflow`. After the dispatch loop has
    /// finished this fails with `Closed`.
    pub fn emit(&self, name: impl Into<String>, args: impl IntoArgs) -> Result<()> {
        let name = name.into();
        let args = args.into_args()?;
        self.inner.registry.ensure(&name)?;

        trace!(event = %name, args = args.len(), "emit");
        self.enqueue(Pending::Emit(Emission::with_args(name, args)))?;
        Counters::bump(&self.inner.counters.emitted);
        Ok(())
    }

    /// Queues `job` to run once on the dispatch thread.
    ///
    /// Shares the queue with `emit`, so a job posted after an emission from
    /// the same thread runs after that emission's listeners.
    pub fn post<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Pending::Job(Box::new(job)))?;
        Counters::bump(&self.inner.counters.posted);
        Ok(())
    }

    fn enqueue(&self, item: Pending) -> Result<()> {
        match self.inner.queue.push(item, self.is_dispatch_thread()) {
            Ok(()) => {
                self.inner.wake.notify();
                Ok(())
            }
            Err(e) => {
                if let EventError::QueueOverflow { capacity } = e {
                    Counters::bump(&self.inner.counters.rejected);
                    warn!(capacity, "emission rejected, dispatch queue full");
                }
                Err(e)
            }
        }
    }

    /// Runs the dispatch loop on the calling thread.
    ///
    /// Blocks until [`quit`](Self::quit) has been called and every emission
    /// queued before that point has been dispatched. Once it returns the
    /// manager is closed for good.
    pub fn run(&self) -> Result<()> {
        let _guard = DispatchGuard::enter(self)?;
        info!("dispatch loop started");

        loop {
            self.inner.wake.wait()?;

            match self.inner.queue.pop()? {
                Some(Pending::Emit(emission)) => self.dispatch(&emission),
                Some(Pending::Job(job)) => self.run_job(job),
                None => {
                    if !self.inner.quit.load(Ordering::SeqCst) {
                        continue;
                    }
                    if self.inner.queue.close_if_empty()? {
                        break;
                    }
                    // The quit wake-up was spent on an empty pop while a
                    // producer was still pushing; keep one for the final check.
                    self.inner.wake.notify();
                }
            }
        }

        info!(dispatched = self.stats().dispatched, "dispatch loop finished");
        Ok(())
    }

    /// Starts [`run`](Self::run) on a new thread named after the config.
    pub fn spawn(&self) -> Result<JoinHandle<Result<()>>> {
        let manager = self.clone();
        thread::Builder::new()
            .name(self.inner.config.thread_name.clone())
            .spawn(move || manager.run())
            .map_err(|e| EventError::Spawn(e.to_string()))
    }

    /// Asks the dispatch loop to return once the queue is drained.
    ///
    /// Also wakes the loop, so an idle dispatcher notices immediately.
    pub fn quit(&self) {
        if !self.inner.quit.swap(true, Ordering::SeqCst) {
            debug!("quit requested");
        }
        self.inner.wake.notify();
    }

    pub fn is_quitting(&self) -> bool {
        self.inner.quit.load(Ordering::SeqCst)
    }

    /// Whether the calling thread is the one running the dispatch loop.
    pub fn is_dispatch_thread(&self) -> bool {
        let current = thread::current().id();
        self.inner
            .dispatch_thread
            .lock()
            .map(|t| *t == Some(current))
            .unwrap_or(false)
    }

    /// Whether some thread is inside [`run`](Self::run).
    pub fn is_running(&self) -> bool {
        self.inner
            .dispatch_thread
            .lock()
            .map(|t| t.is_some())
            .unwrap_or(false)
    }

    /// Whether the loop has finished and the queue refuses new work.
    pub fn is_closed(&self) -> bool {
        self.inner.queue.is_closed()
    }

    /// Number of queued, not yet dispatched items.
    pub fn pending(&self) -> usize {
        self.inner.queue.len()
    }

    pub fn stats(&self) -> DispatchStats {
        self.inner.counters.snapshot()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.registry.contains(name)
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.inner.registry.listener_count(name)
    }

    /// All known event names, sorted.
    pub fn event_names(&self) -> Vec<String> {
        self.inner.registry.names()
    }

    fn dispatch(&self, emission: &Emission) {
        let listeners = match self.inner.registry.snapshot(emission.name()) {
            Ok(listeners) => listeners,
            Err(e) => {
                error!(event = %emission.name(), error = %e, "cannot read listener chain");
                return;
            }
        };

        trace!(event = %emission.name(), listeners = listeners.len(), "dispatch");

        let mut ctx = EmissionContext::new(self, emission);
        for entry in listeners {
            // Disconnected by an earlier listener of this same emission.
            if entry.is_removed() {
                continue;
            }

            let callback = Arc::clone(&entry.callback);
            match panic::catch_unwind(AssertUnwindSafe(|| callback(&mut ctx))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    Counters::bump(&self.inner.counters.failures);
                    error!(
                        event = %emission.name(),
                        listener = %entry.id,
                        error = %e,
                        "listener failed"
                    );
                }
                Err(payload) => {
                    Counters::bump(&self.inner.counters.failures);
                    error!(
                        event = %emission.name(),
                        listener = %entry.id,
                        panic = %panic_message(payload.as_ref()),
                        "listener panicked"
                    );
                }
            }

            if ctx.is_stopped() {
                Counters::bump(&self.inner.counters.stopped);
                debug!(event = %emission.name(), listener = %entry.id, "chain stopped");
                break;
            }
        }

        Counters::bump(&self.inner.counters.dispatched);
    }

    fn run_job(&self, job: Job) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            Counters::bump(&self.inner.counters.failures);
            error!(panic = %panic_message(payload.as_ref()), "posted job panicked");
        }
        Counters::bump(&self.inner.counters.jobs_run);
    }
}

impl std::fmt::Debug for EventManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventManager")
            .field("config", &self.inner.config)
            .field("pending", &self.pending())
            .field("running", &self.is_running())
            .finish()
    }
}

/// Marks the current thread as the dispatch thread for its lifetime.
struct DispatchGuard<'a> {
    manager: &'a EventManager,
}

impl<'a> DispatchGuard<'a> {
    fn enter(manager: &'a EventManager) -> Result<Self> {
        if manager.inner.queue.is_closed() {
            return Err(EventError::Closed);
        }
        let mut current = manager
            .inner
            .dispatch_thread
            .lock()
            .map_err(|e| EventError::LockPoisoned(e.to_string()))?;
        if current.is_some() {
            return Err(EventError::AlreadyRunning);
        }
        *current = Some(thread::current().id());
        Ok(Self { manager })
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        let mut current = match self.manager.inner.dispatch_thread.lock() {
            Ok(t) => t,
            Err(poisoned) => poisoned.into_inner(),
        };
        *current = None;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::KeyCode;
    use crate::OverflowPolicy;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    fn make_manager() -> EventManager {
        EventManager::new(DispatcherConfig::default())
    }

    /// Records `label` into `log` every time the listener fires.
    fn record(
        log: &Arc<Mutex<Vec<String>>>,
        label: &str,
    ) -> impl Fn(&mut EmissionContext<'_>) -> Result<()> + Send + Sync + 'static {
        let log = log.clone();
        let label = label.to_string();
        move |_ctx: &mut EmissionContext<'_>| {
            log.lock().unwrap().push(label.clone());
            Ok(())
        }
    }

    fn drain(manager: &EventManager) {
        manager.quit();
        manager.run().unwrap();
    }

    #[test]
    fn test_emit_then_run_dispatches() {
        let manager = make_manager();
        let log = Arc::new(Mutex::new(Vec::new()));
        manager.on("E", record(&log, "a")).unwrap();

        manager.emit("E", ()).unwrap();
        manager.emit("E", ()).unwrap();
        drain(&manager);

        assert_eq!(*log.lock().unwrap(), vec!["a", "a"]);
        let stats = manager.stats();
        assert_eq!(stats.emitted, 2);
        assert_eq!(stats.dispatched, 2);
        assert_eq!(stats.in_flight(), 0);
    }

    #[test]
    fn test_priority_order() {
        let manager = make_manager();
        let log = Arc::new(Mutex::new(Vec::new()));
        manager
            .subscribe("E", Priority::Last, record(&log, "last"))
            .unwrap();
        manager.on("E", record(&log, "default1")).unwrap();
        manager
            .subscribe("E", Priority::First, record(&log, "first"))
            .unwrap();
        manager.on("E", record(&log, "default2")).unwrap();
        manager
            .subscribe("E", Priority::Level(1), record(&log, "one"))
            .unwrap();

        manager.emit("E", ()).unwrap();
        drain(&manager);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first", "one", "default1", "default2", "last"]
        );
    }

    #[test]
    fn test_stop_only_affects_current_emission() {
        let manager = make_manager();
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = log.clone();
        manager
            .subscribe("E", Priority::First, move |ctx| {
                let stop = ctx.arg::<i64>(0)? == 1;
                l.lock().unwrap().push(format!("first{}", stop));
                if stop {
                    ctx.stop();
                }
                Ok(())
            })
            .unwrap();
        manager.on("E", record(&log, "second")).unwrap();

        manager.emit("E", crate::args![1]).unwrap();
        manager.emit("E", crate::args![0]).unwrap();
        drain(&manager);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["firsttrue", "firstfalse", "second"]
        );
        assert_eq!(manager.stats().stopped, 1);
    }

    #[test]
    fn test_listener_error_and_panic_are_contained() {
        let manager = make_manager();
        let log = Arc::new(Mutex::new(Vec::new()));

        manager
            .subscribe("E", Priority::First, |ctx| {
                // Wrong kind on purpose.
                let _ = ctx.arg::<&str>(0)?;
                Ok(())
            })
            .unwrap();
        manager
            .subscribe("E", Priority::Level(0), |_ctx| panic!("faulty listener"))
            .unwrap();
        manager.on("E", record(&log, "survivor")).unwrap();
        manager.on("F", record(&log, "next emission")).unwrap();

        manager.emit("E", crate::args![5]).unwrap();
        manager.emit("F", ()).unwrap();
        drain(&manager);

        assert_eq!(*log.lock().unwrap(), vec!["survivor", "next emission"]);
        assert_eq!(manager.stats().failures, 2);
    }

    #[test]
    fn test_disconnect_during_dispatch() {
        let manager = make_manager();
        let log = Arc::new(Mutex::new(Vec::new()));

        let victim = Arc::new(Mutex::new(None::<Connection>));
        let v = victim.clone();
        let l = log.clone();
        manager
            .subscribe("E", Priority::First, move |_ctx| {
                l.lock().unwrap().push("killer".to_string());
                if let Some(conn) = v.lock().unwrap().take() {
                    conn.disconnect();
                }
                Ok(())
            })
            .unwrap();
        let conn = manager.on("E", record(&log, "victim")).unwrap();
        manager
            .subscribe("E", Priority::Last, record(&log, "last"))
            .unwrap();
        *victim.lock().unwrap() = Some(conn);

        manager.emit("E", ()).unwrap();
        drain(&manager);

        assert_eq!(*log.lock().unwrap(), vec!["killer", "last"]);
        assert_eq!(manager.listener_count("E"), 2);
    }

    #[test]
    fn test_self_disconnect_fires_once() {
        let manager = make_manager();
        let count = Arc::new(AtomicUsize::new(0));

        let slot = Arc::new(Mutex::new(None::<Connection>));
        let s = slot.clone();
        let c = count.clone();
        let conn = manager
            .on("E", move |_ctx| {
                c.fetch_add(1, Ordering::SeqCst);
                if let Some(conn) = s.lock().unwrap().as_ref() {
                    conn.disconnect();
                }
                Ok(())
            })
            .unwrap();
        *slot.lock().unwrap() = Some(conn.clone());

        for _ in 0..3 {
            manager.emit("E", ()).unwrap();
        }
        drain(&manager);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!conn.is_connected());
    }

    #[test]
    fn test_listener_can_emit_and_subscribe() {
        let manager = make_manager();
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = log.clone();
        manager
            .on("command", move |ctx| {
                let name = ctx.arg::<String>(0)?;
                l.lock().unwrap().push(format!("command:{}", name));
                let late = l.clone();
                ctx.manager().on("late", move |_ctx| {
                    late.lock().unwrap().push("late".to_string());
                    Ok(())
                })?;
                ctx.manager().emit(format!("command {}", name), ())?;
                ctx.manager().emit("late", ())
            })
            .unwrap();
        manager
            .on("command quit", record(&log, "command quit"))
            .unwrap();

        manager.emit("command", crate::args!["quit"]).unwrap();
        drain(&manager);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["command:quit", "command quit", "late"]
        );
    }

    #[test]
    fn test_emit_from_dispatch_thread_grows_full_queue() {
        let manager = EventManager::new(
            DispatcherConfig::new()
                .with_queue_capacity(1)
                .with_overflow_policy(OverflowPolicy::Block),
        );
        let count = Arc::new(AtomicUsize::new(0));

        manager
            .on("burst", |ctx| {
                for _ in 0..5 {
                    ctx.manager().emit("tick", ())?;
                }
                Ok(())
            })
            .unwrap();
        let c = count.clone();
        manager
            .on("tick", move |_ctx| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        manager.emit("burst", ()).unwrap();
        drain(&manager);

        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_reject_policy_reports_overflow() {
        let manager = EventManager::new(
            DispatcherConfig::new()
                .with_queue_capacity(2)
                .with_overflow_policy(OverflowPolicy::Reject),
        );

        manager.emit("E", ()).unwrap();
        manager.emit("E", ()).unwrap();
        assert_eq!(
            manager.emit("E", ()),
            Err(EventError::QueueOverflow { capacity: 2 })
        );
        assert_eq!(manager.stats().rejected, 1);
        assert_eq!(manager.pending(), 2);
    }

    #[test]
    fn test_too_many_args_rejected_before_enqueue() {
        let manager = make_manager();
        let result = manager.emit("E", crate::args![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(result, Err(EventError::TooManyArgs(8)));
        assert_eq!(manager.pending(), 0);
    }

    #[test]
    fn test_emit_lazily_creates_event() {
        let manager = make_manager();
        manager.emit("window updated", ()).unwrap();
        assert!(manager.contains("window updated"));
        assert!(matches!(
            manager.declare("window updated"),
            Err(EventError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_quit_on_idle_loop_returns() {
        let manager = make_manager();
        let handle = manager.spawn().unwrap();

        thread::sleep(Duration::from_millis(20));
        assert!(manager.is_running());
        manager.quit();

        handle.join().unwrap().unwrap();
        assert!(!manager.is_running());
        assert!(manager.is_closed());
    }

    #[test]
    fn test_emit_after_close_fails() {
        let manager = make_manager();
        drain(&manager);

        assert_eq!(manager.emit("E", ()), Err(EventError::Closed));
        assert_eq!(manager.post(|| {}), Err(EventError::Closed));
        assert_eq!(manager.run(), Err(EventError::Closed));
    }

    #[test]
    fn test_second_run_is_refused() {
        let manager = make_manager();
        let (tx, rx) = mpsc::channel();

        manager
            .on("nested run", move |ctx| {
                let result = ctx.manager().run();
                tx.send(result).unwrap();
                Ok(())
            })
            .unwrap();

        manager.emit("nested run", ()).unwrap();
        drain(&manager);

        let result = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(result, Err(EventError::AlreadyRunning));
    }

    #[test]
    fn test_post_runs_on_dispatch_thread() {
        let manager = make_manager();
        let handle = manager.spawn().unwrap();
        let dispatch_id = handle.thread().id();
        let (tx, rx) = mpsc::channel();

        let m = manager.clone();
        thread::spawn(move || {
            m.post(move || {
                tx.send(thread::current().id()).unwrap();
            })
            .unwrap();
        })
        .join()
        .unwrap();

        let ran_on = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(ran_on, dispatch_id);
        assert_ne!(ran_on, thread::current().id());

        manager.quit();
        handle.join().unwrap().unwrap();
        assert_eq!(manager.stats().jobs_run, 1);
    }

    #[test]
    fn test_post_panic_is_contained() {
        let manager = make_manager();
        let count = Arc::new(AtomicUsize::new(0));

        manager.post(|| panic!("bad job")).unwrap();
        let c = count.clone();
        manager
            .post(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        drain(&manager);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(manager.stats().failures, 1);
    }

    #[test]
    fn test_is_dispatch_thread() {
        let manager = make_manager();
        let (tx, rx) = mpsc::channel();

        manager
            .on(crate::names::KEY_PRESSED, move |ctx| {
                let _ = ctx.arg::<KeyCode>(1)?;
                tx.send(ctx.manager().is_dispatch_thread()).unwrap();
                Ok(())
            })
            .unwrap();

        manager
            .emit(crate::names::KEY_PRESSED, crate::args!["a", KeyCode::from('a')])
            .unwrap();
        assert!(!manager.is_dispatch_thread());
        drain(&manager);

        assert!(rx.recv_timeout(Duration::from_secs(1)).unwrap());
    }

    #[test]
    fn test_thread_safe_emit() {
        let manager = make_manager();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        manager
            .on("E", move |_ctx| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        let dispatcher = manager.spawn().unwrap();
        let mut handles = vec![];
        for _ in 0..8 {
            let m = manager.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..50 {
                    m.emit("E", ()).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        manager.quit();
        dispatcher.join().unwrap().unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 400);
    }
}
