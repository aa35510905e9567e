//! Harness configuration.
//!
//! One process-wide switch forces every test into generate mode; it is read
//! once from `MICROTEST_GENERATE` and may be flipped programmatically. Each
//! test snapshots it into its own [`HarnessConfig`] when it begins, so flipping
//! the switch mid-run only affects tests started afterwards.

use once_cell::sync::Lazy;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

/// Environment variable that turns on generate mode for the whole run.
pub const GENERATE_ENV: &str = "MICROTEST_GENERATE";
/// Environment variable that relocates every test's reference data.
pub const TESTDATA_ENV: &str = "MICROTEST_TESTDATA";

/// Default capacity of the per-test failure queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 20;

static GENERATE_RESULTS: Lazy<AtomicBool> =
    Lazy::new(|| AtomicBool::new(env_flag(GENERATE_ENV)));

/// Forces (or stops forcing) generate mode for tests that begin after this call.
pub fn set_generate_results(enabled: bool) {
    GENERATE_RESULTS.store(enabled, Ordering::SeqCst);
}

/// Current value of the process-wide generate switch.
pub fn generate_results() -> bool {
    GENERATE_RESULTS.load(Ordering::SeqCst)
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|value| parse_flag(&value))
        .unwrap_or(false)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Per-test configuration, threaded into the coordinator at construction.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Record actual values as the new references instead of verifying them.
    pub generate_results: bool,
    /// Capacity of the failure queue; reports beyond it escalate.
    pub queue_capacity: usize,
    /// Directory that holds `<test name>/` reference folders. When unset the
    /// `testdata/` folder next to the calling test file is used.
    pub testdata_root: Option<PathBuf>,
    /// Colour diagnostics written to stderr.
    pub use_colors: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            generate_results: generate_results(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            testdata_root: std::env::var_os(TESTDATA_ENV).map(PathBuf::from),
            use_colors: atty::is(atty::Stream::Stderr),
        }
    }
}

impl HarnessConfig {
    /// Defaults, with generate mode also requested by this particular test.
    pub fn with_generate(generate: bool) -> Self {
        let mut config = Self::default();
        config.generate_results |= generate;
        config
    }

    pub fn testdata_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.testdata_root = Some(root.into());
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_parsing_accepts_common_truthy_values() {
        for value in ["1", "true", "TRUE", " yes ", "on"] {
            assert!(parse_flag(value), "{value:?} should enable");
        }
        for value in ["", "0", "false", "no", "generate"] {
            assert!(!parse_flag(value), "{value:?} should not enable");
        }
    }

    #[test]
    fn per_test_request_ors_into_default() {
        let config = HarnessConfig::with_generate(true);
        assert!(config.generate_results);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn queue_capacity_never_zero() {
        assert_eq!(HarnessConfig::default().queue_capacity(0).queue_capacity, 1);
    }
}
