//! Handles all user-facing diagnostics of the harness.
//!
//! Everything is rendered into a `termcolor::Buffer` first. Diagnostics raised
//! while the test runs are written with `eprint!`, so libtest's output capture
//! sees them (a `StandardStream` would bypass capture). The end-of-test report
//! is returned as text and handed to the test's reporter.

use crate::compare::{write_colored_diff, JsonComparison};
use crate::errors::{CallSite, Failure};
use std::fmt::Display;
use std::io::Write;
use termcolor::{Buffer, Color, ColorSpec, WriteColor};

pub const GENERATED_WARNING: &str = "\n!!!!!\nTest actually passed :-), but generate mode is activated. Set MICROTEST_GENERATE=0 and generate=false before committing!\n!!!!!\n";

/// Stderr diagnostics, optionally coloured.
#[derive(Debug, Clone, Copy)]
pub struct Console {
    use_colors: bool,
}

impl Console {
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    fn buffer(&self) -> Buffer {
        if self.use_colors {
            Buffer::ansi()
        } else {
            Buffer::no_color()
        }
    }

    fn render<F>(&self, render: F) -> String
    where
        F: FnOnce(&mut Buffer) -> std::io::Result<()>,
    {
        let mut buffer = self.buffer();
        match render(&mut buffer) {
            Ok(()) => String::from_utf8_lossy(buffer.as_slice()).into_owned(),
            Err(_) => String::new(),
        }
    }

    fn emit<F>(&self, render: F)
    where
        F: FnOnce(&mut Buffer) -> std::io::Result<()>,
    {
        eprint!("{}", self.render(render));
    }

    fn headline(buffer: &mut Buffer, color: Color, text: &str) -> std::io::Result<()> {
        buffer.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
        write!(buffer, "{text}")?;
        buffer.reset()
    }

    pub fn assertion_failed(&self, site: CallSite, message: &dyn Display) {
        self.emit(|b| {
            write!(b, "{site}: ")?;
            Self::headline(b, Color::Red, "Assertion failed:")?;
            writeln!(b, " {message}\n")
        });
    }

    pub fn unexpected_error(&self, site: CallSite, error: &dyn Display) {
        self.emit(|b| {
            write!(b, "{site}: ")?;
            Self::headline(b, Color::Red, "unexpected error:")?;
            writeln!(b, " {error}\n")
        });
    }

    pub fn not_equal(&self, site: CallSite, expected: &dyn std::fmt::Debug, actual: &dyn std::fmt::Debug) {
        self.emit(|b| {
            writeln!(b, "{site}:\n")?;
            b.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
            writeln!(b, "\texpected: {expected:#?}\n")?;
            b.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?;
            writeln!(b, "\tgot: {actual:#?}\n")?;
            b.reset()
        });
    }

    pub fn json_mismatch(&self, site: CallSite, comparison: &JsonComparison) {
        self.emit(|b| match comparison {
            JsonComparison::Equal => Ok(()),
            JsonComparison::Undecodable { .. } => writeln!(b, "{site}:\n\n\t{comparison}\n"),
            JsonComparison::Mismatch(report) => {
                writeln!(b, "{site}:\n")?;
                writeln!(b, "\texpected JSON: {}\n", report.expected_pretty)?;
                writeln!(b, "\tgot JSON: {}\n", report.actual_pretty)?;
                if let Some(diff) = &report.diff {
                    writeln!(b, "Diff:")?;
                    write_colored_diff(b, diff)?;
                }
                Ok(())
            }
        });
    }

    pub fn text_diff(&self, diff: &str) {
        self.emit(|b| {
            writeln!(b, "Diff:")?;
            write_colored_diff(b, diff)
        });
    }

    pub fn fatal(&self, site: Option<CallSite>, message: &dyn Display) {
        self.emit(|b| {
            if let Some(site) = site {
                write!(b, "{site}: ")?;
            }
            Self::headline(b, Color::Red, "FATAL:")?;
            writeln!(b, " {message}")
        });
    }

    pub fn failed_subtest(&self, label: &str) {
        self.emit(|b| {
            Self::headline(b, Color::Yellow, "Failed subtest:")?;
            writeln!(b, " {label}")
        });
    }

    pub fn service_release_failed(&self, failure: &dyn Display) {
        self.emit(|b| writeln!(b, "{failure}"));
    }

    /// The end-of-test report: every drained failure, the active subtest if
    /// any, then the count.
    pub fn summary(&self, failures: &[Failure], escalated: usize, subtest: Option<&str>) -> String {
        self.render(|b| {
            for failure in failures {
                Self::headline(b, Color::Red, "Error:")?;
                writeln!(b, " {failure}")?;
            }
            if let Some(label) = subtest {
                Self::headline(b, Color::Yellow, "Failed subtest:")?;
                writeln!(b, " {label}")?;
            }
            write!(b, "{}", summary_line(failures.len(), escalated))
        })
    }

    pub fn generated(&self, written: Option<&str>) -> String {
        self.render(|b| {
            if let Some(path) = written {
                writeln!(b, "Results written to {path}")?;
            }
            b.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
            write!(b, "{}", GENERATED_WARNING.trim())?;
            b.reset()
        })
    }
}

/// `"N errors"`, plus the count of failures that bypassed the queue (fatal
/// harness errors and overflow) when there are any.
pub fn summary_line(errors: usize, escalated: usize) -> String {
    if escalated == 0 {
        format!("{errors} errors")
    } else {
        format!("{errors} errors, {escalated} escalated")
    }
}
