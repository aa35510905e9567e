//! Microtest Error Handling
//!
//! Two kinds of failure flow through the harness:
//!
//! - [`HarnessError`]: the harness itself could not do its job (reference data
//!   missing, unreadable, undecodable, unwritable). These are fatal for the
//!   whole test and are never queued.
//! - [`Failure`]: a recoverable assertion failure raised by the test body or a
//!   worker. It is queued on the coordinator and the reporting thread unwinds
//!   with [`Abort`].

use miette::Diagnostic;
use std::fmt;
use std::panic::Location;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// HARNESS ERRORS - fatal setup conditions
// ============================================================================

/// Errors raised while reading, writing or decoding golden reference data.
#[derive(Error, Diagnostic, Debug)]
pub enum HarnessError {
    #[error("cannot encode {what} as JSON: {source}")]
    #[diagnostic(code(microtest::golden::encode))]
    Encode {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot decode reference value in '{location}': {source}")]
    #[diagnostic(
        code(microtest::golden::decode),
        help("the stored reference no longer matches the shape of the value under test; regenerate it")
    )]
    Decode {
        location: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot read reference file {}: {source}", path.display())]
    #[diagnostic(code(microtest::golden::read))]
    ReadReference {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write reference file {}: {source}", path.display())]
    #[diagnostic(code(microtest::golden::write))]
    WriteReference {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("reference not found: {location}")]
    #[diagnostic(
        code(microtest::golden::not_found),
        help("run the test once with MICROTEST_GENERATE=1 to record it")
    )]
    ReferenceNotFound { location: String },

    #[error("reference mismatch: {location}")]
    #[diagnostic(
        code(microtest::golden::mismatch),
        help("inspect the reference and regenerate it if the new output is correct")
    )]
    Mismatch { location: String },

    #[error("service '{name}' failed to release: {reason}")]
    #[diagnostic(code(microtest::service::release))]
    Service { name: String, reason: String },
}

impl HarnessError {
    pub fn encode(what: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Encode {
            what: what.into(),
            source,
        }
    }

    pub fn decode(location: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            location: location.into(),
            source,
        }
    }

    pub fn not_found(location: impl Into<String>) -> Self {
        Self::ReferenceNotFound {
            location: location.into(),
        }
    }
}

// ============================================================================
// FAILURES - recoverable, queued, reported once at the end of the test
// ============================================================================

/// Source position of the test line that raised a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub file: &'static str,
    pub line: u32,
}

impl CallSite {
    /// Captures the caller of the outermost `#[track_caller]` frame.
    #[track_caller]
    pub fn here() -> Self {
        Self::from(Location::caller())
    }

    /// File name without directories, as printed in diagnostics.
    pub fn short_file(&self) -> &'static str {
        self.file
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or(self.file)
    }
}

impl From<&'static Location<'static>> for CallSite {
    fn from(location: &'static Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
        }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.short_file(), self.line)
    }
}

/// One failed check, queued for the end-of-test summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub message: String,
    pub site: Option<CallSite>,
}

impl Failure {
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            site: Some(CallSite::here()),
        }
    }

    /// A failure with no meaningful source position (e.g. a worker panic).
    pub fn unlocated(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            site: None,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.site {
            Some(site) => write!(f, "{}: {}", site, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl From<&HarnessError> for Failure {
    fn from(error: &HarnessError) -> Self {
        Failure::unlocated(error.to_string())
    }
}

// ============================================================================
// ABORT SENTINEL - per-thread unwind
// ============================================================================

/// Returned by a check that failed. The current test segment (the test body
/// or one worker) should stop and return it; sibling workers keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abort;

impl fmt::Display for Abort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("test segment aborted after a reported failure")
    }
}

impl std::error::Error for Abort {}

/// Result type of every check on the coordinator.
pub type Outcome<T = ()> = Result<T, Abort>;

/// Prints a harness error with full miette diagnostics.
pub fn print_error(error: HarnessError) {
    eprintln!("{}", render_error(error));
}

/// The miette report of `error`: message, diagnostic code and help.
pub fn render_error(error: HarnessError) -> String {
    format!("{:?}", miette::Report::new(error))
}
