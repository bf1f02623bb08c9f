//! Dispatcher stress run: many producer threads, one dispatch thread.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::info;

use dcterm_events::{args, DispatchStats, DispatcherConfig, EventError, EventManager, Priority};

use crate::error::{AppError, Result};
use crate::producer::Producer;

const BENCH_EVENT: &str = "bench";

#[derive(Debug, Clone)]
pub struct BenchReport {
    pub producers: usize,
    pub emissions: usize,
    pub elapsed: Duration,
    /// Emissions whose listener chain ran.
    pub delivered: u64,
    /// Emissions from one producer seen out of emit order.
    pub order_violations: u64,
    pub stats: DispatchStats,
}

impl BenchReport {
    /// Delivered emissions per second.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return self.delivered as f64;
        }
        self.delivered as f64 / secs
    }
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} producers x {} emissions in {:.3}s ({:.0}/s)",
            self.producers,
            self.emissions,
            self.elapsed.as_secs_f64(),
            self.rate()
        )?;
        writeln!(
            f,
            "delivered {}  rejected {}  failures {}  order violations {}",
            self.delivered, self.stats.rejected, self.stats.failures, self.order_violations
        )?;
        write!(
            f,
            "emitted {}  dispatched {}  in flight {}",
            self.stats.emitted,
            self.stats.dispatched,
            self.stats.in_flight()
        )
    }
}

/// Runs `producers` threads each emitting `emissions` events, then quits and
/// waits for the queue to drain.
///
/// Under [`OverflowPolicy::Reject`](dcterm_events::OverflowPolicy::Reject)
/// refused emissions are counted in `stats.rejected`, not treated as errors.
pub fn run_bench(config: DispatcherConfig, producers: usize, emissions: usize) -> Result<BenchReport> {
    let manager = EventManager::new(config);
    let delivered = Arc::new(AtomicU64::new(0));
    let violations = Arc::new(AtomicU64::new(0));
    let last_seen: Arc<Mutex<HashMap<i64, i64>>> = Arc::default();

    let counter = delivered.clone();
    manager.subscribe(BENCH_EVENT, Priority::First, move |_ctx| {
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(())
    })?;

    let bad = violations.clone();
    manager.subscribe(BENCH_EVENT, Priority::Last, move |ctx| {
        let producer = ctx.arg::<i64>(0)?;
        let seq = ctx.arg::<i64>(1)?;
        let mut last = last_seen
            .lock()
            .map_err(|e| EventError::LockPoisoned(e.to_string()))?;
        let previous = last.insert(producer, seq);
        if previous.is_some_and(|p| p >= seq) {
            bad.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    })?;

    let dispatcher = manager.spawn()?;
    let start = Instant::now();

    let threads = (0..producers)
        .map(|p| {
            let manager = manager.clone();
            Producer::spawn(format!("bench-{}", p), move || {
                for seq in 0..emissions {
                    match manager.emit(BENCH_EVENT, args![p as i64, seq as i64]) {
                        Ok(()) | Err(EventError::QueueOverflow { .. }) => {}
                        Err(e) => return Err(e.into()),
                    }
                }
                Ok(())
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut first_error = None;
    for thread in threads {
        if let Err(e) = thread.join() {
            first_error.get_or_insert(e);
        }
    }
    manager.quit();
    dispatcher
        .join()
        .map_err(|_| AppError::Thread("dispatch thread panicked".to_string()))??;
    let elapsed = start.elapsed();

    if let Some(e) = first_error {
        return Err(e);
    }

    let report = BenchReport {
        producers,
        emissions,
        elapsed,
        delivered: delivered.load(Ordering::Relaxed),
        order_violations: violations.load(Ordering::Relaxed),
        stats: manager.stats(),
    };
    info!(
        delivered = report.delivered,
        rejected = report.stats.rejected,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "bench finished"
    );
    Ok(report)
}
