//! Service bundles and the default entry point for tests.

pub mod files;
pub mod random;

use crate::config::HarnessConfig;
use crate::errors::Outcome;
use crate::lifecycle::{TestSession, TestTools};
use std::ops::Deref;

pub use files::FileServices;
pub use random::RandomServices;

/// The services every default test gets.
#[derive(Debug)]
pub struct DefaultServices {
    pub files: FileServices,
    pub random: RandomServices,
}

impl DefaultServices {
    pub fn new(tools: &TestTools) -> Self {
        Self {
            files: FileServices::new(tools.clone()),
            random: RandomServices,
        }
    }
}

/// A test session composed with [`DefaultServices`].
///
/// Dereferences to [`TestTools`]; dropping it terminates the test.
#[derive(Debug)]
pub struct DefaultTestTools {
    session: TestSession,
    pub services: DefaultServices,
}

impl DefaultTestTools {
    pub fn new(session: TestSession) -> Self {
        let services = DefaultServices::new(session.tools());
        Self { session, services }
    }

    pub fn tools(&self) -> &TestTools {
        self.session.tools()
    }

    pub fn finish(self) {
        self.session.finish();
    }

    pub fn run<F>(self, body: F)
    where
        F: FnOnce(&TestTools, &DefaultServices) -> Outcome,
    {
        let services = self.services;
        self.session.run(|t| body(t, &services));
    }
}

impl Deref for DefaultTestTools {
    type Target = TestTools;

    fn deref(&self) -> &TestTools {
        self.session.tools()
    }
}

/// Starts a test under the built-in harness. Reference data is kept in
/// `testdata/<test name>/` next to the calling file; `generate` switches this
/// test to recording mode on top of `MICROTEST_GENERATE`.
#[track_caller]
pub fn begin_test(generate: bool) -> DefaultTestTools {
    let session = TestSession::builder()
        .config(HarnessConfig::with_generate(generate))
        .begin();
    DefaultTestTools::new(session)
}
