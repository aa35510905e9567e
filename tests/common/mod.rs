//! Shared helpers for the integration tests: running a test body under a
//! recording reporter so the harness's own verdict can be inspected.

#![allow(dead_code)]

use microtest::golden::{GoldenStorage, MemoryStorage};
use microtest::reporter::{panic_message, FailNow, RecordingReporter};
use microtest::{HarnessConfig, Outcome, TestReporter, TestSession, TestTools};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What happened to one meta-test.
#[derive(Debug)]
pub struct MetaRun {
    pub reporter: Arc<RecordingReporter>,
    /// The body did not reach its end.
    pub early: bool,
    /// Message of the `fail_now` that stopped the orchestrator, if any.
    pub stop: Option<String>,
    /// Any other panic that escaped the session.
    pub panic: Option<String>,
}

impl MetaRun {
    pub fn failed(&self) -> bool {
        self.reporter.failed()
    }
}

pub fn config(root: &Path, generate: bool) -> HarnessConfig {
    let mut config = HarnessConfig::default().colors(false).testdata_root(root);
    config.generate_results = generate;
    config
}

pub fn session(
    name: &str,
    config: HarnessConfig,
    storage: Arc<dyn GoldenStorage>,
) -> (TestSession, Arc<RecordingReporter>) {
    let reporter = Arc::new(RecordingReporter::new(name));
    let session = TestSession::builder()
        .reporter(reporter.clone())
        .config(config)
        .storage(storage)
        .begin();
    (session, reporter)
}

/// Runs `body` as a complete test with `storage` as its golden store.
pub fn meta_test_with<F>(name: &str, config: HarnessConfig, storage: Arc<dyn GoldenStorage>, body: F) -> MetaRun
where
    F: FnOnce(&TestTools) -> Outcome,
{
    let (session, reporter) = session(name, config, storage);
    let completed = AtomicBool::new(false);
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        session.run(|t| {
            body(t)?;
            completed.store(true, Ordering::SeqCst);
            Ok(())
        })
    }));
    let (stop, panic) = match result {
        Ok(()) => (None, None),
        Err(payload) => match payload.downcast::<FailNow>() {
            Ok(stop) => (Some(stop.message), None),
            Err(other) => (None, Some(panic_message(other.as_ref()))),
        },
    };
    MetaRun {
        reporter,
        early: !completed.load(Ordering::SeqCst),
        stop,
        panic,
    }
}

/// Runs `body` in verify mode against an empty in-memory store.
pub fn meta_test<F>(name: &str, body: F) -> MetaRun
where
    F: FnOnce(&TestTools) -> Outcome,
{
    meta_test_with(
        name,
        config(Path::new("testdata"), false),
        Arc::new(MemoryStorage::new()),
        body,
    )
}
