//! Simulated share hashing.
//!
//! A hashing job runs on its own thread, reports progress with
//! [`names::HASH_PROGRESS`] emissions, and hands its final digest to the
//! window through the window's async channel.

use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tracing::{debug, info, warn};

use dcterm_events::{args, names, EventError, EventManager};

use crate::error::Result;
use crate::producer::{still_open, Producer, StopFlag};
use crate::window::Window;

/// Bytes processed per progress report.
pub const CHUNK_SIZE: u64 = 64 * 1024;

#[derive(Debug, Clone)]
pub struct HashJob {
    pub file: String,
    pub total: u64,
    /// Pause between chunks, standing in for disk reads.
    pub delay: Duration,
}

impl HashJob {
    pub fn new(file: impl Into<String>, total: u64) -> Self {
        Self {
            file: file.into(),
            total,
            delay: Duration::from_millis(20),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

pub fn spawn(
    manager: EventManager,
    window: Arc<Window>,
    job: HashJob,
    stop: StopFlag,
) -> Result<Producer> {
    let name = format!("hash {}", job.file);
    Producer::spawn(name, move || run(&manager, &window, job, &stop))
}

fn run(manager: &EventManager, window: &Arc<Window>, job: HashJob, stop: &StopFlag) -> Result<()> {
    let total = i64::try_from(job.total).map_err(EventError::listener)?;
    info!(file = %job.file, total, "hashing started");
    let mut hasher = DefaultHasher::new();
    let mut done = 0u64;

    while done < job.total {
        if stop.wait(job.delay) {
            debug!(file = %job.file, done, "hashing interrupted");
            return Ok(());
        }
        let chunk = CHUNK_SIZE.min(job.total - done);
        hasher.write_u64(done);
        hasher.write_u64(chunk);
        done += chunk;

        let progress = args![job.file.as_str(), done as i64, total];
        if !still_open(manager.emit(names::HASH_PROGRESS, progress))? {
            return Ok(());
        }
    }

    let digest = format!("{:016x}", hasher.finish());
    info!(file = %job.file, %digest, "hashing finished");

    // The queued closure must not keep the window alive on its own.
    let target = Arc::downgrade(window);
    let notifier = manager.clone();
    let line = format!("hashed {} ({} bytes): {}", job.file, job.total, digest);
    still_open(
        window
            .channel()
            .post(move || show_result(&target, &notifier, line)),
    )?;
    Ok(())
}

/// Runs on the dispatch thread once a job is done.
fn show_result(window: &Weak<Window>, manager: &EventManager, line: String) {
    let Some(window) = window.upgrade() else {
        debug!("window closed before hashing finished");
        return;
    };
    window.add_line(line);
    if let Err(e) = window.notify_updated(manager) {
        warn!(error = %e, "failed to refresh window");
    }
}

/// `"45%"` style progress text.
pub fn percent(done: i64, total: i64) -> String {
    if total <= 0 {
        return "100%".to_string();
    }
    format!("{}%", (done.clamp(0, total) * 100) / total)
}
