//! microtest: a test lifecycle harness for test bodies that spread over many
//! threads, with golden-file verification.
//!
//! ```no_run
//! use microtest::begin_test;
//!
//! #[test]
//! fn writes_report() {
//!     begin_test(false).run(|t, services| {
//!         let path = services.files.new_temp_file()?;
//!         t.ok(std::fs::write(&path, "3 widgets"))?;
//!         t.spawn(|w| w.equals(2 + 2, 4))?;
//!         let written = t.ok(std::fs::read_to_string(&path))?;
//!         t.equals_key("report", &written)
//!     });
//! }
//! ```

pub use crate::errors::{Abort, CallSite, Failure, HarnessError, Outcome};

pub mod basic;
pub mod cli;
pub mod compare;
pub mod config;
pub mod errors;
pub mod golden;
pub mod lifecycle;
pub mod registry;
pub mod report;
pub mod reporter;
pub mod services;
pub mod tracker;

pub use crate::config::{set_generate_results, HarnessConfig};
pub use crate::golden::GoldenMode;
pub use crate::lifecycle::{SessionBuilder, TestSession, TestTools};
pub use crate::registry::{FnService, Service};
pub use crate::reporter::{LibtestReporter, RecordingReporter, TestReporter};
pub use crate::services::{begin_test, DefaultServices, DefaultTestTools};
