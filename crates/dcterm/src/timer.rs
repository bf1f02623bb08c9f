//! Once-per-tick timer thread.

use std::time::Duration;

use tracing::debug;

use dcterm_events::{args, names, EventManager};

use crate::error::Result;
use crate::producer::{still_open, Producer, StopFlag};

/// Starts a thread that emits [`names::TIMER_SECOND`] with a running tick
/// count (starting at 1) every `tick`.
pub fn spawn(manager: EventManager, tick: Duration, stop: StopFlag) -> Result<Producer> {
    Producer::spawn("timer", move || run(&manager, tick, &stop))
}

fn run(manager: &EventManager, tick: Duration, stop: &StopFlag) -> Result<()> {
    let mut ticks: i64 = 0;
    while !stop.wait(tick) {
        ticks += 1;
        if !still_open(manager.emit(names::TIMER_SECOND, args![ticks]))? {
            break;
        }
    }
    debug!(ticks, "timer stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcterm_events::DispatcherConfig;
    use std::sync::mpsc;

    #[test]
    fn test_timer_emits_increasing_ticks() {
        let manager = EventManager::new(DispatcherConfig::default());
        let (tx, rx) = mpsc::channel();
        manager
            .on(names::TIMER_SECOND, move |ctx| {
                let _ = tx.send(ctx.arg::<i64>(0)?);
                Ok(())
            })
            .unwrap();
        let dispatcher = manager.spawn().unwrap();
        let stop = StopFlag::new();
        let timer = spawn(manager.clone(), Duration::from_millis(5), stop.clone()).unwrap();

        let first = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        stop.stop();
        timer.join().unwrap();
        manager.quit();
        dispatcher.join().unwrap().unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn test_timer_exits_when_dispatcher_closed() {
        let manager = EventManager::new(DispatcherConfig::default());
        manager.quit();
        manager.run().unwrap();

        let timer = spawn(manager, Duration::from_millis(1), StopFlag::new()).unwrap();
        timer.join().unwrap();
    }
}
