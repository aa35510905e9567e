//! Single-shot assertions for tests that do not need a session.
//!
//! Each check prints the same diagnostic as its [`TestTools`](crate::TestTools)
//! counterpart and then stops the test through the reporter straight away.

use crate::compare::{semantic_json_equals, JsonComparison};
use crate::errors::CallSite;
use crate::report::Console;
use crate::reporter::TestReporter;
use serde::Serialize;
use std::fmt::{Debug, Display};
use std::io;
use std::path::Path;

pub use crate::services::random::random_array;

fn console() -> Console {
    Console::new(atty::is(atty::Stream::Stderr))
}

/// Stops the test if `condition` is false.
#[track_caller]
pub fn assert(reporter: &dyn TestReporter, condition: bool, message: impl Display) {
    if !condition {
        let site = CallSite::here();
        console().assertion_failed(site, &message);
        reporter.fail_now(&format!("{site}: Assertion failed: {message}"));
    }
}

/// Unwraps `result`, stopping the test on `Err`.
#[track_caller]
pub fn ok<T, E: Display>(reporter: &dyn TestReporter, result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(error) => {
            let site = CallSite::here();
            console().unexpected_error(site, &error);
            reporter.fail_now(&format!("{site}: {error}"))
        }
    }
}

#[track_caller]
pub fn equals<A, B>(reporter: &dyn TestReporter, expected: A, actual: B)
where
    A: PartialEq<B> + Debug,
    B: Debug,
{
    if expected != actual {
        let site = CallSite::here();
        console().not_equal(site, &expected, &actual);
        reporter.fail_now(&format!("{site}: Expressions don't match"));
    }
}

/// Stops the test if `result` is not an error; returns the error otherwise.
#[track_caller]
pub fn must_fail<T, E>(reporter: &dyn TestReporter, result: Result<T, E>, message: impl Display) -> E {
    match result {
        Err(error) => error,
        Ok(_) => {
            let site = CallSite::here();
            console().assertion_failed(site, &message);
            reporter.fail_now(&format!("{site}: Should have failed: {message}"))
        }
    }
}

#[track_caller]
pub fn must_fail_with<T, E>(reporter: &dyn TestReporter, result: Result<T, E>, expected: E)
where
    E: PartialEq + Debug,
{
    let message = match &result {
        Err(error) if *error == expected => return,
        Err(error) => format!("Expected error to be '{expected:?}'. Got '{error:?}'"),
        Ok(_) => format!("Expected error to be '{expected:?}'. Got no error"),
    };
    let site = CallSite::here();
    console().assertion_failed(site, &message);
    reporter.fail_now(&format!("{site}: {message}"));
}

#[track_caller]
pub fn json_equals(reporter: &dyn TestReporter, expected: &[u8], actual: &[u8]) {
    let comparison = semantic_json_equals(expected, actual);
    if comparison.is_equal() {
        return;
    }
    let site = CallSite::here();
    console().json_mismatch(site, &comparison);
    let message = match &comparison {
        JsonComparison::Undecodable { .. } => comparison.to_string(),
        _ => "JSONs don't match".to_string(),
    };
    reporter.fail_now(&format!("{site}: {message}"));
}

/// Serializes `actual` and compares it with the JSON text `expected`.
#[track_caller]
pub fn json_equals_string<T: Serialize + ?Sized>(reporter: &dyn TestReporter, expected: &str, actual: &T) {
    let encoded = ok(reporter, serde_json::to_vec(actual));
    json_equals(reporter, expected.as_bytes(), &encoded);
}

/// Creates `path` and any missing parents.
pub fn create_directory(path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    std::fs::create_dir_all(path)?;
    if path.is_dir() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!("{} exists but is not a directory", path.display()),
        ))
    }
}
