//! Golden-file checks available on [`TestTools`].
//!
//! Values checked by key are collected in the test's `results.json`, which is
//! written once when a generating test terminates. Values checked by file are
//! read or written immediately.

use super::TestTools;
use crate::compare::{json_pretty, semantic_json_equals, JsonComparison};
use crate::errors::{CallSite, Failure, HarnessError, Outcome};
use crate::golden::{
    compare_or_record, compare_or_record_text, read_reference, write_reference, TextVerdict,
    Verdict,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

impl TestTools {
    /// Compares `actual` with the value recorded under `key`, or records it.
    #[track_caller]
    pub fn equals_key<T>(&self, key: &str, actual: &T) -> Outcome
    where
        T: Serialize + DeserializeOwned + PartialEq + Debug,
    {
        let site = CallSite::here();
        let location = self.layout().key_location(key);
        let verdict = compare_or_record(
            self.mode(),
            &location,
            actual,
            || {
                self.results()
                    .lock()
                    .get(key)
                    .map(<[u8]>::to_vec)
                    .ok_or_else(|| HarnessError::not_found(location.clone()))
            },
            |bytes| {
                self.results()
                    .lock()
                    .insert(key, bytes)
                    .map_err(|e| HarnessError::encode(location.clone(), e))
            },
        );
        self.settle(site, &location, actual, verdict)
    }

    fn settle<T: Debug>(
        &self,
        site: CallSite,
        location: &str,
        actual: &T,
        verdict: Result<Verdict<T>, HarnessError>,
    ) -> Outcome {
        match verdict {
            Err(error) => Err(self.fatal_error(site, error)),
            Ok(Verdict::Recorded) | Ok(Verdict::Matched) => Ok(()),
            Ok(Verdict::Mismatched { expected }) => {
                self.console().not_equal(site, &expected, actual);
                let mismatch = HarnessError::Mismatch {
                    location: location.to_string(),
                };
                Err(self.error(Failure {
                    message: format!("Expressions don't match. {mismatch}"),
                    site: Some(site),
                }))
            }
        }
    }

    /// Compares `actual` with the text stored in `file`, or writes it there.
    #[track_caller]
    pub fn equals_text_file(&self, file: &str, actual: &str) -> Outcome {
        let site = CallSite::here();
        let layout = self.layout();
        let path = layout.file_path(file);
        let verdict = compare_or_record_text(
            self.mode(),
            actual,
            || read_reference(self.storage(), &path),
            |bytes| write_reference(self.storage(), layout, &path, &bytes),
        );
        match verdict {
            Err(error) => Err(self.fatal_error(site, error)),
            Ok(TextVerdict::Recorded) | Ok(TextVerdict::Matched) => Ok(()),
            Ok(TextVerdict::Mismatched { expected, diff }) => {
                match diff {
                    Some(diff) => self.console().text_diff(&diff),
                    None => self.console().not_equal(site, &expected, &actual),
                }
                Err(self.error(Failure {
                    message: format!(
                        "Expressions don't match. Check file {}",
                        path.display()
                    ),
                    site: Some(site),
                }))
            }
        }
    }

    /// Compares the encoded JSON document `actual` with the one stored in
    /// `file`, or writes its canonical form there.
    #[track_caller]
    pub fn json_bytes_equals_file(&self, file: &str, actual: &[u8]) -> Outcome {
        let site = CallSite::here();
        let layout = self.layout();
        let path = layout.file_path(file);
        if self.is_generating() {
            return write_reference(self.storage(), layout, &path, &json_pretty(actual))
                .map_err(|error| self.fatal_error(site, error));
        }
        let expected = read_reference(self.storage(), &path)
            .map_err(|error| self.fatal_error(site, error))?;
        match semantic_json_equals(&expected, actual) {
            JsonComparison::Equal => Ok(()),
            comparison => {
                self.console().json_mismatch(site, &comparison);
                Err(self.error(Failure {
                    message: format!("JSONs don't match. Test result file: {}", path.display()),
                    site: Some(site),
                }))
            }
        }
    }

    /// Serializes `actual` and checks it against `file`.
    #[track_caller]
    pub fn json_equals_file<T: Serialize + ?Sized>(&self, file: &str, actual: &T) -> Outcome {
        let site = CallSite::here();
        let encoded = serde_json::to_vec(actual).map_err(|e| {
            self.fatal_error(site, HarnessError::encode(self.layout().file_location(file), e))
        })?;
        self.json_bytes_equals_file(file, &encoded)
    }

    /// Checks that `sample` serializes to the document stored in `file` and
    /// that decoding that document gives back an equal value.
    #[track_caller]
    pub fn test_json_marshaller<T>(&self, file: &str, sample: &T) -> Outcome
    where
        T: Serialize + DeserializeOwned + PartialEq + Debug,
    {
        let encoded = self.ok(serde_json::to_vec(sample))?;
        self.json_bytes_equals_file(file, &encoded)?;
        let decoded: T = self.ok(serde_json::from_slice(&encoded))?;
        self.equals(sample, &decoded)
    }
}
