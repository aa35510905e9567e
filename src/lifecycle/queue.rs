//! Bounded failure queue shared by the orchestrator and its workers.

use crate::errors::Failure;
use crossbeam_queue::ArrayQueue;
use std::sync::atomic::{AtomicBool, Ordering};

/// What happened to a pushed failure.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    Queued,
    /// No room left; the failure is handed back.
    Full(Failure),
    /// The test is already terminating; the failure is handed back.
    Closed(Failure),
}

/// Lock-free bounded queue. Pushing never blocks: a full queue rejects.
///
/// Closing happens after every worker has been waited for, so no tracked
/// push can race the close. An untracked thread that pushes after the drain
/// has started gets its failure back as `Closed`, so it is never lost.
#[derive(Debug)]
pub struct FailureQueue {
    slots: ArrayQueue<Failure>,
    closed: AtomicBool,
    drained: AtomicBool,
}

impl FailureQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: ArrayQueue::new(capacity.max(1)),
            closed: AtomicBool::new(false),
            drained: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn push(&self, failure: Failure) -> Admission {
        if self.closed.load(Ordering::SeqCst) {
            return Admission::Closed(failure);
        }
        self.admit(failure)
    }

    fn admit(&self, failure: Failure) -> Admission {
        let kept = failure.clone();
        match self.slots.push(failure) {
            // Too late for the drain, which may or may not have taken it.
            Ok(()) if self.drained.load(Ordering::SeqCst) => Admission::Closed(kept),
            Ok(()) => Admission::Queued,
            Err(failure) => Admission::Full(failure),
        }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Empties the queue in arrival order. Only the first call returns
    /// anything; later calls get `None`.
    pub fn drain(&self) -> Option<Vec<Failure>> {
        if self.drained.swap(true, Ordering::SeqCst) {
            return None;
        }
        let mut failures = Vec::with_capacity(self.slots.len());
        while let Some(failure) = self.slots.pop() {
            failures.push(failure);
        }
        Some(failures)
    }
}
