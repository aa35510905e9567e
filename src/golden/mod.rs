//! Golden store: recorded reference data for a test.
//!
//! Every test owns one directory. Small values live under named keys in
//! `results.json` inside it; larger payloads live in their own files next to
//! it. In verify mode references are read and compared; in generate mode the
//! current values overwrite them.

pub mod storage;

use crate::compare::{render_three_way, structural_equals, to_pretty_json};
use crate::errors::HarnessError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::value::RawValue;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub use storage::{FsStorage, GoldenStorage, MemoryStorage};

/// Name of the per-test key/value document.
pub const RESULTS_FILE: &str = "results.json";

/// Whether references are checked or rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoldenMode {
    Verify,
    Generate,
}

impl GoldenMode {
    pub fn from_flag(generate: bool) -> Self {
        if generate {
            GoldenMode::Generate
        } else {
            GoldenMode::Verify
        }
    }

    pub fn is_generate(self) -> bool {
        self == GoldenMode::Generate
    }
}

// ============================================================================
// LAYOUT
// ============================================================================

/// Paths of one test's reference data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoldenLayout {
    dir: PathBuf,
}

impl GoldenLayout {
    /// `<root>/<test name>`, with `::` path separators in the test name
    /// turned into nested directories.
    pub fn new(root: impl AsRef<Path>, test_name: &str) -> Self {
        let mut dir = root.as_ref().to_path_buf();
        for part in test_name.split("::").filter(|p| !p.is_empty()) {
            dir.push(sanitize(part));
        }
        Self { dir }
    }

    /// `testdata/` next to the source file that started the test.
    pub fn beside_source(source_file: &str, test_name: &str) -> Self {
        let parent = Path::new(source_file)
            .parent()
            .unwrap_or_else(|| Path::new(""));
        Self::new(parent.join("testdata"), test_name)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn results_path(&self) -> PathBuf {
        self.dir.join(RESULTS_FILE)
    }

    pub fn file_path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Human-readable location of a key inside the results document.
    pub fn key_location(&self, key: &str) -> String {
        format!("key '{}' in {}", key, self.results_path().display())
    }

    pub fn file_location(&self, file: &str) -> String {
        format!("file {}", self.file_path(file).display())
    }
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

// ============================================================================
// RESULTS DOCUMENT
// ============================================================================

/// Key to raw JSON value mapping persisted as `results.json`.
#[derive(Debug, Default)]
pub struct GoldenDocument {
    entries: BTreeMap<String, Box<RawValue>>,
}

impl GoldenDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the document for verify mode. A missing or unreadable document
    /// means the test has never recorded anything and yields an empty one.
    pub fn load(storage: &dyn GoldenStorage, path: &Path) -> Self {
        let bytes = match storage.read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "no results document, starting empty");
                return Self::new();
            }
        };
        match Self::from_bytes(&bytes) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "results document does not decode, starting empty");
                Self::new()
            }
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let entries: BTreeMap<String, Box<RawValue>> = serde_json::from_slice(bytes)?;
        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(|raw| raw.get().as_bytes())
    }

    /// Stores an encoded value under `key`, replacing any previous one.
    pub fn insert(&mut self, key: impl Into<String>, encoded: Vec<u8>) -> Result<(), serde_json::Error> {
        let text = String::from_utf8(encoded).map_err(|e| {
            <serde_json::Error as serde::de::Error>::custom(format!("value is not UTF-8: {e}"))
        })?;
        let raw = RawValue::from_string(text)?;
        self.entries.insert(key.into(), raw);
        Ok(())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Canonical persisted form: tab-indented, keys sorted.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        to_pretty_json(&self.entries)
    }

    /// Writes the document under `layout`, creating the directory first.
    pub fn persist(&self, storage: &dyn GoldenStorage, layout: &GoldenLayout) -> Result<(), HarnessError> {
        let bytes = self
            .to_bytes()
            .map_err(|e| HarnessError::encode(RESULTS_FILE, e))?;
        write_reference(storage, layout, &layout.results_path(), &bytes)
    }
}

/// Creates the test directory and writes one reference payload into it.
pub fn write_reference(
    storage: &dyn GoldenStorage,
    layout: &GoldenLayout,
    path: &Path,
    bytes: &[u8],
) -> Result<(), HarnessError> {
    storage
        .create_dir_all(layout.dir())
        .and_then(|_| storage.write(path, bytes))
        .map_err(|source| HarnessError::WriteReference {
            path: path.to_path_buf(),
            source,
        })
}

/// Reads one reference payload; absence is a "reference not found" error.
pub fn read_reference(storage: &dyn GoldenStorage, path: &Path) -> Result<Vec<u8>, HarnessError> {
    storage.read(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            HarnessError::not_found(format!("file {}", path.display()))
        } else {
            HarnessError::ReadReference {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

// ============================================================================
// COMPARE OR RECORD
// ============================================================================

/// What [`compare_or_record`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict<T> {
    /// Generate mode: the actual value was written as the new reference.
    Recorded,
    Matched,
    Mismatched { expected: T },
}

/// Generate mode serializes `actual` and hands it to `write`. Verify mode
/// decodes whatever `read` returns into a `T` and compares it with `actual`.
///
/// `location` names the storage slot in errors so a human can find it.
pub fn compare_or_record<T, R, W>(
    mode: GoldenMode,
    location: &str,
    actual: &T,
    read: R,
    write: W,
) -> Result<Verdict<T>, HarnessError>
where
    T: Serialize + DeserializeOwned + PartialEq,
    R: FnOnce() -> Result<Vec<u8>, HarnessError>,
    W: FnOnce(Vec<u8>) -> Result<(), HarnessError>,
{
    match mode {
        GoldenMode::Generate => {
            let bytes = to_pretty_json(actual).map_err(|e| HarnessError::encode(location, e))?;
            write(bytes)?;
            Ok(Verdict::Recorded)
        }
        GoldenMode::Verify => {
            let bytes = read()?;
            let expected: T =
                serde_json::from_slice(&bytes).map_err(|e| HarnessError::decode(location, e))?;
            if structural_equals(&expected, actual) {
                Ok(Verdict::Matched)
            } else {
                Ok(Verdict::Mismatched { expected })
            }
        }
    }
}

/// Text flavour of [`compare_or_record`]: references are stored verbatim and a
/// mismatch carries a conflict-marked diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextVerdict {
    Recorded,
    Matched,
    Mismatched {
        expected: String,
        diff: Option<String>,
    },
}

pub fn compare_or_record_text<R, W>(
    mode: GoldenMode,
    actual: &str,
    read: R,
    write: W,
) -> Result<TextVerdict, HarnessError>
where
    R: FnOnce() -> Result<Vec<u8>, HarnessError>,
    W: FnOnce(Vec<u8>) -> Result<(), HarnessError>,
{
    match mode {
        GoldenMode::Generate => {
            write(actual.as_bytes().to_vec())?;
            Ok(TextVerdict::Recorded)
        }
        GoldenMode::Verify => {
            let expected = String::from_utf8_lossy(&read()?).into_owned();
            if expected == actual {
                Ok(TextVerdict::Matched)
            } else {
                let diff = render_three_way(&expected, actual);
                Ok(TextVerdict::Mismatched { expected, diff })
            }
        }
    }
}
