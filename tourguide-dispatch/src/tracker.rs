//! Background thread that runs a tick on a fixed interval until stopped.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use log::{debug, warn};

/// Whether the tracker should keep ticking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    /// Wait for the next interval.
    Continue,
    /// Exit the tracking loop.
    Stop,
}

/// Periodic tracking loop on a named thread.
///
/// The tick runs immediately, then once per `interval`. Stopping wakes the
/// thread from its wait; a tick already in progress is allowed to finish.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
/// use tourguide_dispatch::{PeriodicTracker, TickControl};
///
/// # fn main() -> std::io::Result<()> {
/// let ticks = Arc::new(AtomicUsize::new(0));
/// let seen = Arc::clone(&ticks);
/// let tracker = PeriodicTracker::start("example", Duration::from_secs(60), move || {
///     seen.fetch_add(1, Ordering::SeqCst);
///     TickControl::Stop
/// })?;
/// tracker.stop();
/// assert_eq!(ticks.load(Ordering::SeqCst), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PeriodicTracker {
    name: String,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTracker {
    /// Spawn the tracking thread.
    ///
    /// # Errors
    /// Returns the I/O error raised when the thread cannot be spawned.
    pub fn start<F>(name: impl Into<String>, interval: Duration, mut tick: F) -> std::io::Result<Self>
    where
        F: FnMut() -> TickControl + Send + 'static,
    {
        let tracker_name: String = name.into();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let thread_name = tracker_name.clone();
        let handle = thread::Builder::new().name(tracker_name.clone()).spawn(move || {
            debug!("tracker {thread_name} started with interval {interval:?}");
            loop {
                if tick() == TickControl::Stop {
                    break;
                }
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            debug!("tracker {thread_name} stopped");
        })?;
        Ok(Self {
            name: tracker_name,
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Thread name of the tracker.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signal the thread and wait for the current tick to finish.
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        if let Some(stop) = self.stop.take()
            && stop.send(()).is_err()
        {
            debug!("tracker {} had already exited", self.name);
        }
        let Some(handle) = self.handle.take() else {
            return;
        };
        // The last owner of the tracked service may drop it from inside a tick.
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            warn!("tracker {} panicked", self.name);
        }
    }
}

impl Drop for PeriodicTracker {
    fn drop(&mut self) {
        self.halt();
    }
}
