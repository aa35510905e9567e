//! Counts worker threads running on behalf of a test so the coordinator can
//! wait for all of them before it looks at the failure queue.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct WorkerTracker {
    in_flight: Mutex<usize>,
    idle: Condvar,
}

impl WorkerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// One more worker is running.
    pub fn mark_start(&self) {
        *self.in_flight.lock() += 1;
    }

    /// A worker finished. An unmatched call is ignored rather than letting
    /// the count go below zero.
    pub fn mark_done(&self) {
        let mut in_flight = self.in_flight.lock();
        if *in_flight == 0 {
            tracing::warn!("worker marked done without a matching start");
            return;
        }
        *in_flight -= 1;
        if *in_flight == 0 {
            self.idle.notify_all();
        }
    }

    pub fn in_flight(&self) -> usize {
        *self.in_flight.lock()
    }

    /// Blocks until no worker is running.
    pub fn wait_all(&self) {
        let mut in_flight = self.in_flight.lock();
        while *in_flight > 0 {
            self.idle.wait(&mut in_flight);
        }
    }
}

/// Holds one slot of the tracker and gives it back on drop, including when
/// the worker unwinds.
#[derive(Debug)]
pub struct WorkerGuard {
    tracker: Arc<WorkerTracker>,
}

impl WorkerGuard {
    pub fn start(tracker: Arc<WorkerTracker>) -> Self {
        tracker.mark_start();
        Self { tracker }
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.tracker.mark_done();
    }
}
