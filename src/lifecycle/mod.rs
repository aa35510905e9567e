//! Test lifecycle coordinator.
//!
//! A [`TestSession`] is opened when a test begins and owns the termination
//! sequence. The [`TestTools`] it hands out are cheap clones that the test body
//! and its worker threads use to run checks, spawn more workers, register
//! services and record golden values.
//!
//! A failed check queues a [`Failure`] and returns [`Abort`], ending only the
//! current segment (the body or one worker). The whole test is judged once, at
//! termination:
//!
//! 1. wait for every worker
//! 2. close the failure queue
//! 3. release services, newest first
//! 4. if the body panicked, stop here and let the panic continue
//! 5. drain the queue
//! 6. any failure: print the summary and fail the test
//! 7. generate mode: persist `results.json`, then fail the test anyway

pub mod assertions;
pub mod golden;
pub mod queue;

use crate::config::HarnessConfig;
use crate::errors::{render_error, Abort, CallSite, Failure, HarnessError, Outcome};
use crate::golden::{FsStorage, GoldenDocument, GoldenLayout, GoldenMode, GoldenStorage};
use crate::registry::{FnService, ReleaseError, Service, ServiceRegistry};
use crate::report::{summary_line, Console, GENERATED_WARNING};
use crate::reporter::{panic_message, LibtestReporter, TestReporter};
use crate::tracker::{WorkerGuard, WorkerTracker};
use parking_lot::Mutex;
use queue::{Admission, FailureQueue};
use std::ops::Deref;
use std::panic::{self, AssertUnwindSafe, Location};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Where a test is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Terminating,
    Done,
}

struct Inner {
    reporter: Arc<dyn TestReporter>,
    console: Console,
    mode: GoldenMode,
    layout: GoldenLayout,
    storage: Arc<dyn GoldenStorage>,
    queue: FailureQueue,
    tracker: Arc<WorkerTracker>,
    /// Failures that bypassed the queue: fatal errors and overflow.
    escalations: AtomicUsize,
    workers_spawned: AtomicUsize,
    subtest: Mutex<Option<String>>,
    services: Mutex<ServiceRegistry>,
    results: Mutex<GoldenDocument>,
    phase: Mutex<Phase>,
}

/// Handle on a running test, shared by the body and its workers.
#[derive(Clone)]
pub struct TestTools {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TestTools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestTools")
            .field("name", &self.name())
            .field("mode", &self.inner.mode)
            .field("phase", &*self.inner.phase.lock())
            .finish()
    }
}

impl TestTools {
    pub fn name(&self) -> &str {
        self.inner.reporter.name()
    }

    pub fn mode(&self) -> GoldenMode {
        self.inner.mode
    }

    pub fn is_generating(&self) -> bool {
        self.inner.mode.is_generate()
    }

    /// Directory holding this test's reference data.
    pub fn testdata_dir(&self) -> &Path {
        self.inner.layout.dir()
    }

    pub fn layout(&self) -> &GoldenLayout {
        &self.inner.layout
    }

    pub fn reporter(&self) -> &dyn TestReporter {
        &*self.inner.reporter
    }

    pub fn phase(&self) -> Phase {
        *self.inner.phase.lock()
    }

    pub(crate) fn console(&self) -> Console {
        self.inner.console
    }

    pub(crate) fn storage(&self) -> &dyn GoldenStorage {
        &*self.inner.storage
    }

    pub(crate) fn results(&self) -> &Mutex<GoldenDocument> {
        &self.inner.results
    }

    // ------------------------------------------------------------------
    // failure routing
    // ------------------------------------------------------------------

    /// Queues `failure` and returns the sentinel that ends the current
    /// segment. When the queue is full (or already closed) the whole test is
    /// marked failed on the spot instead.
    pub fn error(&self, failure: Failure) -> Abort {
        if let Some(label) = self.subtest() {
            self.inner.console.failed_subtest(&label);
        }
        match self.inner.queue.push(failure) {
            Admission::Queued => {}
            Admission::Full(failure) => self.escalate("failure queue is full", &failure),
            Admission::Closed(failure) => self.escalate("test already terminated", &failure),
        }
        Abort
    }

    fn escalate(&self, reason: &str, failure: &Failure) {
        self.inner.escalations.fetch_add(1, Ordering::SeqCst);
        tracing::warn!(test = %self.name(), reason, failure = %failure, "failure escalated to the whole test");
        self.inner
            .console
            .fatal(failure.site, &format_args!("{reason}: {}", failure.message));
        self.inner.reporter.fail();
    }

    pub(crate) fn escalate_fatal(&self, site: CallSite, message: &dyn std::fmt::Display) -> Abort {
        self.inner.escalations.fetch_add(1, Ordering::SeqCst);
        tracing::warn!(test = %self.name(), message = %message, "fatal failure");
        self.inner.console.fatal(Some(site), message);
        self.inner.reporter.fail();
        Abort
    }

    /// A harness error: printed, the test marked failed at once, never queued.
    pub(crate) fn fatal_error(&self, site: CallSite, error: HarnessError) -> Abort {
        self.escalate_fatal(site, &render_error(error))
    }

    /// Failures queued so far.
    pub fn pending_failures(&self) -> usize {
        self.inner.queue.len()
    }

    // ------------------------------------------------------------------
    // workers
    // ------------------------------------------------------------------

    /// Runs `work` on a new thread that the termination sequence waits for.
    /// A failed check or a panic inside `work` ends that worker only.
    #[track_caller]
    pub fn spawn<F>(&self, work: F) -> Outcome
    where
        F: FnOnce(&TestTools) -> Outcome + Send + 'static,
    {
        let site = CallSite::here();
        let guard = WorkerGuard::start(Arc::clone(&self.inner.tracker));
        let id = self.inner.workers_spawned.fetch_add(1, Ordering::SeqCst);
        let tools = self.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}#worker-{id}", self.name()))
            .spawn(move || {
                let _guard = guard;
                tools.run_worker(site, work);
            });
        match spawned {
            Ok(_) => Ok(()),
            Err(e) => Err(self.error(Failure {
                message: format!("cannot spawn worker: {e}"),
                site: Some(site),
            })),
        }
    }

    fn run_worker<F>(&self, site: CallSite, work: F)
    where
        F: FnOnce(&TestTools) -> Outcome,
    {
        match panic::catch_unwind(AssertUnwindSafe(|| work(self))) {
            Ok(Ok(())) => {}
            // Already queued by the check that aborted.
            Ok(Err(Abort)) => {}
            Err(payload) => {
                let message = format!("worker panicked: {}", panic_message(payload.as_ref()));
                let _ = self.error(Failure {
                    message,
                    site: Some(site),
                });
            }
        }
    }

    /// Counts a thread started by the caller. Pair with [`routine_end`](Self::routine_end).
    pub fn routine_start(&self) {
        self.inner.tracker.mark_start();
    }

    pub fn routine_end(&self) {
        self.inner.tracker.mark_done();
    }

    /// RAII form of `routine_start`/`routine_end`; move it into the thread.
    pub fn worker_guard(&self) -> WorkerGuard {
        WorkerGuard::start(Arc::clone(&self.inner.tracker))
    }

    pub fn workers_in_flight(&self) -> usize {
        self.inner.tracker.in_flight()
    }

    // ------------------------------------------------------------------
    // subtests
    // ------------------------------------------------------------------

    /// Labels subsequent failures. Replaces any active label.
    pub fn start_subtest(&self, label: impl Into<String>) {
        *self.inner.subtest.lock() = Some(label.into());
    }

    pub fn end_subtest(&self) {
        *self.inner.subtest.lock() = None;
    }

    pub fn subtest(&self) -> Option<String> {
        self.inner.subtest.lock().clone()
    }

    /// Runs `body` under `label`. The label stays active if `body` aborts, so
    /// the final summary names it.
    pub fn in_subtest<F>(&self, label: impl Into<String>, body: F) -> Outcome
    where
        F: FnOnce(&TestTools) -> Outcome,
    {
        self.start_subtest(label);
        body(self)?;
        self.end_subtest();
        Ok(())
    }

    // ------------------------------------------------------------------
    // services
    // ------------------------------------------------------------------

    /// Hands `service` to the registry; it is released when the test ends.
    pub fn add_service<S: Service + 'static>(&self, service: S) {
        self.inner.services.lock().register(Box::new(service));
    }

    pub fn add_cleanup<F>(&self, name: impl Into<String>, cleanup: F)
    where
        F: FnOnce() -> Result<(), ReleaseError> + Send + 'static,
    {
        self.add_service(FnService::new(name, cleanup));
    }

    pub fn service_count(&self) -> usize {
        self.inner.services.lock().len()
    }

    // ------------------------------------------------------------------
    // termination
    // ------------------------------------------------------------------

    fn terminate(&self, panicking: bool) {
        {
            let mut phase = self.inner.phase.lock();
            if *phase != Phase::Running {
                return;
            }
            *phase = Phase::Terminating;
        }
        tracing::debug!(test = %self.name(), panicking, "terminating test");

        self.inner.tracker.wait_all();
        self.inner.queue.close();

        // Released outside the lock: cleanups may call back into the tools,
        // and anything they register is released in a later round.
        let mut release_failures = Vec::new();
        loop {
            let mut registry = std::mem::take(&mut *self.inner.services.lock());
            if registry.is_empty() {
                break;
            }
            release_failures.extend(registry.release_all());
        }
        for failure in release_failures {
            self.inner
                .console
                .service_release_failed(&HarnessError::from(failure));
        }

        if panicking {
            *self.inner.phase.lock() = Phase::Done;
            return;
        }

        let failures = self.inner.queue.drain().unwrap_or_default();
        *self.inner.phase.lock() = Phase::Done;

        let escalations = self.inner.escalations.load(Ordering::SeqCst);
        if !failures.is_empty() || escalations > 0 || self.inner.reporter.failed() {
            let subtest = self.subtest();
            let summary = self
                .inner
                .console
                .summary(&failures, escalations, subtest.as_deref());
            self.inner.reporter.log(&summary);
            self.inner
                .reporter
                .fail_now(&summary_line(failures.len(), escalations));
        }

        if self.is_generating() {
            match self.persist_results() {
                Ok(written) => {
                    let shown = written.map(|p| p.display().to_string());
                    self.inner
                        .reporter
                        .log(&self.inner.console.generated(shown.as_deref()));
                }
                Err(error) => {
                    let message = error.to_string();
                    self.inner.console.fatal(None, &render_error(error));
                    self.inner.reporter.fail_now(&message);
                }
            }
            self.inner.reporter.fail_now(GENERATED_WARNING);
        }
        tracing::debug!(test = %self.name(), "test passed");
    }

    fn persist_results(&self) -> Result<Option<PathBuf>, HarnessError> {
        let results = self.inner.results.lock();
        if results.is_empty() {
            return Ok(None);
        }
        results.persist(&*self.inner.storage, &self.inner.layout)?;
        Ok(Some(self.inner.layout.results_path()))
    }
}

// ============================================================================
// SESSION - owns the termination sequence
// ============================================================================

/// Configures a new [`TestSession`].
pub struct SessionBuilder {
    reporter: Option<Arc<dyn TestReporter>>,
    config: HarnessConfig,
    storage: Arc<dyn GoldenStorage>,
    source_file: &'static str,
}

impl SessionBuilder {
    pub fn reporter(mut self, reporter: Arc<dyn TestReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    /// Requests generate mode for this test on top of the process-wide switch.
    pub fn generate(mut self, generate: bool) -> Self {
        self.config.generate_results |= generate;
        self
    }

    pub fn storage(mut self, storage: Arc<dyn GoldenStorage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn begin(self) -> TestSession {
        let reporter = self
            .reporter
            .unwrap_or_else(|| Arc::new(LibtestReporter::for_current_test()));
        let name = reporter.name().to_string();
        let layout = match &self.config.testdata_root {
            Some(root) => GoldenLayout::new(root, &name),
            None => GoldenLayout::beside_source(self.source_file, &name),
        };
        let mode = GoldenMode::from_flag(self.config.generate_results);
        let results = match mode {
            GoldenMode::Generate => GoldenDocument::new(),
            GoldenMode::Verify => GoldenDocument::load(&*self.storage, &layout.results_path()),
        };
        tracing::debug!(test = %name, ?mode, dir = %layout.dir().display(), "test started");

        let inner = Inner {
            reporter,
            console: Console::new(self.config.use_colors),
            mode,
            layout,
            storage: self.storage,
            queue: FailureQueue::new(self.config.queue_capacity),
            tracker: Arc::new(WorkerTracker::new()),
            escalations: AtomicUsize::new(0),
            workers_spawned: AtomicUsize::new(0),
            subtest: Mutex::new(None),
            services: Mutex::new(ServiceRegistry::new()),
            results: Mutex::new(results),
            phase: Mutex::new(Phase::Running),
        };
        TestSession {
            tools: TestTools {
                inner: Arc::new(inner),
            },
        }
    }
}

/// The orchestrator's handle. Dropping it runs the termination sequence, so
/// cleanup happens whichever way the test body exits.
#[derive(Debug)]
pub struct TestSession {
    tools: TestTools,
}

impl TestSession {
    /// Reference data lands in `testdata/` next to the file calling this.
    #[track_caller]
    pub fn builder() -> SessionBuilder {
        SessionBuilder {
            reporter: None,
            config: HarnessConfig::default(),
            storage: Arc::new(FsStorage),
            source_file: Location::caller().file(),
        }
    }

    /// Starts a libtest test with default configuration.
    #[track_caller]
    pub fn begin(generate: bool) -> Self {
        Self::builder().generate(generate).begin()
    }

    pub fn tools(&self) -> &TestTools {
        &self.tools
    }

    /// Runs the termination sequence now.
    pub fn finish(self) {
        self.tools.terminate(false);
    }

    /// Runs `body`, then terminates. A panic in `body` still gets workers
    /// waited for and services released before it is resumed.
    pub fn run<F>(self, body: F)
    where
        F: FnOnce(&TestTools) -> Outcome,
    {
        match panic::catch_unwind(AssertUnwindSafe(|| body(&self.tools))) {
            Ok(_) => self.finish(),
            Err(payload) => {
                self.tools.terminate(true);
                panic::resume_unwind(payload);
            }
        }
    }
}

impl Deref for TestSession {
    type Target = TestTools;

    fn deref(&self) -> &TestTools {
        &self.tools
    }
}

impl Drop for TestSession {
    fn drop(&mut self) {
        self.tools.terminate(thread::panicking());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::golden::MemoryStorage;
    use crate::reporter::{FailNow, RecordingReporter};
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    fn session(reporter: &Arc<RecordingReporter>) -> TestSession {
        TestSession::builder()
            .reporter(reporter.clone())
            .config(HarnessConfig::default().colors(false).testdata_root("td"))
            .storage(Arc::new(MemoryStorage::new()))
            .begin()
    }

    fn outcome_of(reporter: &Arc<RecordingReporter>, body: impl FnOnce(&TestTools) -> Outcome) -> Option<String> {
        let session = session(reporter);
        let result = panic::catch_unwind(AssertUnwindSafe(|| session.run(body)));
        result
            .err()
            .map(|payload| match payload.downcast::<FailNow>() {
                Ok(stop) => stop.message,
                Err(other) => panic_message(other.as_ref()),
            })
    }

    #[test]
    fn empty_test_passes() {
        let reporter = Arc::new(RecordingReporter::new("empty"));
        assert_eq!(outcome_of(&reporter, |_| Ok(())), None);
        assert!(!reporter.failed());
    }

    #[test]
    fn queued_failure_fails_at_termination() {
        let reporter = Arc::new(RecordingReporter::new("one_error"));
        let stop = outcome_of(&reporter, |t| Err(t.error(Failure::new("boom"))));
        assert_eq!(stop.as_deref(), Some("1 errors"));
        assert!(reporter.stopped());
    }

    #[test]
    fn overflow_escalates_immediately() {
        let reporter = Arc::new(RecordingReporter::new("overflow"));
        let session = TestSession::builder()
            .reporter(reporter.clone())
            .config(HarnessConfig::default().colors(false).queue_capacity(2).testdata_root("td"))
            .storage(Arc::new(MemoryStorage::new()))
            .begin();
        let _ = session.error(Failure::unlocated("a"));
        let _ = session.error(Failure::unlocated("b"));
        assert!(!reporter.failed());
        let _ = session.error(Failure::unlocated("c"));
        assert!(reporter.failed());
        assert!(!reporter.stopped());

        let payload = panic::catch_unwind(AssertUnwindSafe(|| session.finish())).unwrap_err();
        assert_eq!(
            payload.downcast_ref::<FailNow>().map(|s| s.message.as_str()),
            Some("2 errors, 1 escalated")
        );
    }

    #[test]
    fn termination_waits_for_workers_and_runs_once() {
        let reporter = Arc::new(RecordingReporter::new("workers"));
        let done = Arc::new(AtomicBool::new(false));
        let seen = done.clone();
        let session = session(&reporter);
        session
            .spawn(move |_| {
                thread::sleep(Duration::from_millis(50));
                seen.store(true, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        let tools = session.tools().clone();
        session.finish();
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(tools.phase(), Phase::Done);
        assert_eq!(tools.workers_in_flight(), 0);
    }

    #[test]
    fn panicking_body_is_resumed_after_cleanup() {
        let reporter = Arc::new(RecordingReporter::new("panics"));
        let released = Arc::new(AtomicBool::new(false));
        let flag = released.clone();
        let stop = outcome_of(&reporter, move |t| {
            t.add_cleanup("flag", move || {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            });
            panic!("body exploded");
        });
        assert_eq!(stop.as_deref(), Some("body exploded"));
        assert!(released.load(Ordering::SeqCst));
        // The panic is not turned into a harness failure.
        assert!(!reporter.stopped());
    }

    #[test]
    fn report_after_close_escalates() {
        let reporter = Arc::new(RecordingReporter::new("late"));
        let session = session(&reporter);
        let tools = session.tools().clone();
        session.finish();
        let _ = tools.error(Failure::unlocated("too late"));
        assert!(reporter.failed());
    }

    #[test]
    fn subtest_label_survives_abort() {
        let reporter = Arc::new(RecordingReporter::new("subtests"));
        let session = session(&reporter);
        let outcome = session.in_subtest("case 3", |t| Err(t.error(Failure::unlocated("bad"))));
        assert_eq!(outcome, Err(Abort));
        assert_eq!(session.subtest().as_deref(), Some("case 3"));
        session.in_subtest("case 4", |_| Ok(())).unwrap();
        assert_eq!(session.subtest(), None);
        let _ = panic::catch_unwind(AssertUnwindSafe(|| session.finish()));
    }
}
