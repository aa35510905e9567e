//! Checks available on [`TestTools`].
//!
//! Every check prints its diagnostic immediately, queues a [`Failure`] pointing
//! at the calling line and returns `Err(Abort)`. Use `?` to end the current
//! segment on failure.

use super::TestTools;
use crate::compare::{semantic_json_equals, JsonComparison};
use crate::errors::{Abort, CallSite, Failure, Outcome};
use crate::reporter::panic_message;
use serde::Serialize;
use std::fmt::{Debug, Display};
use std::panic::{self, AssertUnwindSafe};

impl TestTools {
    fn fail_at(&self, site: CallSite, message: impl Into<String>) -> Abort {
        self.error(Failure {
            message: message.into(),
            site: Some(site),
        })
    }

    #[track_caller]
    pub fn assert(&self, condition: bool, message: impl Display) -> Outcome {
        if condition {
            return Ok(());
        }
        let site = CallSite::here();
        self.console().assertion_failed(site, &message);
        Err(self.fail_at(site, format!("Assertion failed: {message}")))
    }

    /// Unwraps `result`, failing on `Err`.
    #[track_caller]
    pub fn ok<T, E: Display>(&self, result: Result<T, E>) -> Outcome<T> {
        match result {
            Ok(value) => Ok(value),
            Err(error) => {
                let site = CallSite::here();
                self.console().unexpected_error(site, &error);
                Err(self.fail_at(site, error.to_string()))
            }
        }
    }

    /// Fails when `expected != actual`. Pass references for values you want to
    /// keep.
    #[track_caller]
    pub fn equals<A, B>(&self, expected: A, actual: B) -> Outcome
    where
        A: PartialEq<B> + Debug,
        B: Debug,
    {
        if expected == actual {
            return Ok(());
        }
        let site = CallSite::here();
        self.console().not_equal(site, &expected, &actual);
        Err(self.fail_at(site, "Expressions don't match"))
    }

    /// Expects `result` to be an error and returns it.
    #[track_caller]
    pub fn must_fail<T, E>(&self, result: Result<T, E>, message: impl Display) -> Outcome<E> {
        match result {
            Err(error) => Ok(error),
            Ok(_) => {
                let site = CallSite::here();
                self.console().assertion_failed(site, &message);
                Err(self.fail_at(site, format!("Should have failed: {message}")))
            }
        }
    }

    /// Expects `result` to be exactly `expected`.
    #[track_caller]
    pub fn must_fail_with<T, E>(&self, result: Result<T, E>, expected: E) -> Outcome
    where
        E: PartialEq + Debug,
    {
        let site = CallSite::here();
        let message = match &result {
            Err(error) if *error == expected => return Ok(()),
            Err(error) => format!("Expected error to be '{expected:?}'. Got '{error:?}'"),
            Ok(_) => format!("Expected error to be '{expected:?}'. Got no error"),
        };
        self.console().assertion_failed(site, &message);
        Err(self.fail_at(site, message))
    }

    /// Expects `f` to panic.
    #[track_caller]
    pub fn must_panic<F, R>(&self, f: F) -> Outcome
    where
        F: FnOnce() -> R,
    {
        let site = CallSite::here();
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Err(_) => Ok(()),
            Ok(_) => {
                let message = "should have panicked";
                self.console().assertion_failed(site, &message);
                Err(self.fail_at(site, message))
            }
        }
    }

    /// Expects `f` to panic with exactly `expected` as its message.
    #[track_caller]
    pub fn must_panic_with<F, R>(&self, expected: &str, f: F) -> Outcome
    where
        F: FnOnce() -> R,
    {
        let site = CallSite::here();
        let message = match panic::catch_unwind(AssertUnwindSafe(f)) {
            Err(payload) => {
                let got = panic_message(payload.as_ref());
                if got == expected {
                    return Ok(());
                }
                format!("Expected panic '{expected}'. Got '{got}'")
            }
            Ok(_) => format!("Expected panic '{expected}'. Got no panic"),
        };
        self.console().assertion_failed(site, &message);
        Err(self.fail_at(site, message))
    }

    /// Compares two encoded JSON documents by decoded value.
    #[track_caller]
    pub fn json_equals(&self, expected: &[u8], actual: &[u8]) -> Outcome {
        let site = CallSite::here();
        match semantic_json_equals(expected, actual) {
            JsonComparison::Equal => Ok(()),
            comparison => {
                self.console().json_mismatch(site, &comparison);
                let message = match &comparison {
                    JsonComparison::Undecodable { .. } => comparison.to_string(),
                    _ => "JSONs don't match".to_string(),
                };
                Err(self.fail_at(site, message))
            }
        }
    }

    /// Serializes `actual` and compares it with the JSON text `expected`.
    #[track_caller]
    pub fn json_equals_str<T: Serialize + ?Sized>(&self, expected: &str, actual: &T) -> Outcome {
        let encoded = self.ok(serde_json::to_vec(actual))?;
        self.json_equals(expected.as_bytes(), &encoded)
    }

    /// Fails the whole test at once, bypassing the queue, and ends the
    /// current segment.
    #[track_caller]
    pub fn fatal(&self, message: impl Display) -> Abort {
        let site = CallSite::here();
        self.escalate_fatal(site, &message)
    }
}
