//! The test framework seen from the harness: a name, a way to log, and two
//! ways to fail.

use parking_lot::Mutex;
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};

/// Identity and pass/fail signalling of the running test. The coordinator
/// never decides the outcome on its own; it always goes through this.
pub trait TestReporter: Send + Sync {
    fn name(&self) -> &str;

    fn log(&self, message: &str);

    /// Marks the test failed and lets it carry on.
    fn fail(&self);

    /// Marks the test failed and stops the calling thread.
    fn fail_now(&self, message: &str) -> !;

    fn failed(&self) -> bool;
}

/// Name of the current test as libtest sees it, i.e. the name of the
/// thread it runs the test on.
pub fn current_test_name() -> String {
    match std::thread::current().name() {
        Some(name) if name != "main" => name.to_string(),
        _ => "unnamed_test".to_string(),
    }
}

/// Reporter for tests run by the built-in test harness. Failing "now" panics
/// the orchestrator thread, which is how libtest learns about it.
#[derive(Debug)]
pub struct LibtestReporter {
    name: String,
    failed: AtomicBool,
}

impl LibtestReporter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failed: AtomicBool::new(false),
        }
    }

    pub fn for_current_test() -> Self {
        Self::new(current_test_name())
    }
}

impl TestReporter for LibtestReporter {
    fn name(&self) -> &str {
        &self.name
    }

    fn log(&self, message: &str) {
        eprintln!("{message}");
    }

    fn fail(&self) {
        self.failed.store(true, Ordering::SeqCst);
    }

    fn fail_now(&self, message: &str) -> ! {
        self.failed.store(true, Ordering::SeqCst);
        panic!("{}", message);
    }

    fn failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }
}

/// Unwind payload used by [`RecordingReporter::fail_now`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailNow {
    pub message: String,
}

/// Reporter that records what happened instead of failing anything. Used to
/// test the harness itself and custom tool bundles built on top of it.
#[derive(Debug)]
pub struct RecordingReporter {
    name: String,
    failed: AtomicBool,
    stopped: AtomicBool,
    logs: Mutex<Vec<String>>,
    stop_messages: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failed: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            logs: Mutex::new(Vec::new()),
            stop_messages: Mutex::new(Vec::new()),
        }
    }

    /// Whether `fail_now` was called.
    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn logs(&self) -> Vec<String> {
        self.logs.lock().clone()
    }

    pub fn stop_messages(&self) -> Vec<String> {
        self.stop_messages.lock().clone()
    }
}

impl TestReporter for RecordingReporter {
    fn name(&self) -> &str {
        &self.name
    }

    fn log(&self, message: &str) {
        self.logs.lock().push(message.to_string());
    }

    fn fail(&self) {
        self.failed.store(true, Ordering::SeqCst);
    }

    fn fail_now(&self, message: &str) -> ! {
        self.failed.store(true, Ordering::SeqCst);
        self.stopped.store(true, Ordering::SeqCst);
        self.stop_messages.lock().push(message.to_string());
        // resume_unwind skips the panic hook, keeping meta-test output quiet.
        panic::resume_unwind(Box::new(FailNow {
            message: message.to_string(),
        }))
    }

    fn failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }
}

/// Extracts a readable message from a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(stop) = payload.downcast_ref::<FailNow>() {
        stop.message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
