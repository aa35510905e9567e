//! The `microtest` command-line tool.
//!
//! Operator tooling for golden data: comparing two JSON documents the way the
//! harness does, and checking that every recorded `results.json` still decodes.

use crate::cli::args::{Command, MicrotestArgs};
use crate::compare::{semantic_json_equals, write_colored_diff, JsonComparison};
use crate::errors::{print_error, HarnessError};
use crate::golden::{GoldenDocument, RESULTS_FILE};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use walkdir::WalkDir;

pub mod args;

/// The main entry point for the CLI.
pub fn run() {
    let args = MicrotestArgs::parse();
    let choice = if args.no_color || !atty::is(atty::Stream::Stdout) {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };
    let mut out = StandardStream::stdout(choice);

    let result = match args.command {
        Command::Diff { expected, actual } => diff_files(&mut out, &expected, &actual),
        Command::Check { root } => check_tree(&mut out, &root),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            print_error(e);
            process::exit(1);
        }
    }
}

// ============================================================================
// DIFF
// ============================================================================

/// Compares two JSON files. Returns whether they are equal.
pub fn diff_files<W: WriteColor>(out: &mut W, expected: &Path, actual: &Path) -> Result<bool, HarnessError> {
    let expected_bytes = read(expected)?;
    let actual_bytes = read(actual)?;
    let comparison = semantic_json_equals(&expected_bytes, &actual_bytes);
    write_comparison(out, &comparison).map_err(|source| HarnessError::WriteReference {
        path: PathBuf::from("<stdout>"),
        source,
    })?;
    Ok(comparison.is_equal())
}

fn read(path: &Path) -> Result<Vec<u8>, HarnessError> {
    std::fs::read(path).map_err(|source| HarnessError::ReadReference {
        path: path.to_path_buf(),
        source,
    })
}

fn write_comparison<W: WriteColor>(out: &mut W, comparison: &JsonComparison) -> std::io::Result<()> {
    match comparison {
        JsonComparison::Equal => {
            out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
            writeln!(out, "JSONs match")?;
            out.reset()
        }
        JsonComparison::Undecodable { .. } => {
            out.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?;
            writeln!(out, "{comparison}")?;
            out.reset()
        }
        JsonComparison::Mismatch(report) => {
            out.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
            writeln!(out, "JSONs don't match")?;
            out.reset()?;
            match &report.diff {
                Some(diff) => write_colored_diff(out, diff),
                None => {
                    writeln!(out, "expected JSON: {}", report.expected_pretty)?;
                    writeln!(out, "got JSON: {}", report.actual_pretty)
                }
            }
        }
    }
}

// ============================================================================
// CHECK
// ============================================================================

/// One `results.json` that could not be read or decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckProblem {
    pub path: PathBuf,
    pub reason: String,
}

/// Every results document under a `testdata` directory below `root`.
pub fn find_results(root: &Path) -> (Vec<PathBuf>, Vec<CheckProblem>) {
    let mut documents = Vec::new();
    let mut problems = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        match entry {
            Ok(entry) => {
                let path = entry.path();
                let in_testdata = path
                    .ancestors()
                    .skip(1)
                    .any(|a| a.file_name().map_or(false, |n| n == "testdata"));
                if entry.file_type().is_file() && entry.file_name() == RESULTS_FILE && in_testdata {
                    documents.push(path.to_path_buf());
                }
            }
            Err(e) => problems.push(CheckProblem {
                path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf()),
                reason: e.to_string(),
            }),
        }
    }
    (documents, problems)
}

/// Decodes one results document, returning how many keys it holds.
pub fn check_document(path: &Path) -> Result<usize, CheckProblem> {
    let problem = |reason: String| CheckProblem {
        path: path.to_path_buf(),
        reason,
    };
    let bytes = std::fs::read(path).map_err(|e| problem(e.to_string()))?;
    let document = GoldenDocument::from_bytes(&bytes).map_err(|e| problem(e.to_string()))?;
    Ok(document.len())
}

/// Checks every results document under `root`. Returns whether all decoded.
pub fn check_tree<W: WriteColor>(out: &mut W, root: &Path) -> Result<bool, HarnessError> {
    let io_error = |source: std::io::Error| HarnessError::WriteReference {
        path: PathBuf::from("<stdout>"),
        source,
    };
    let (documents, mut problems) = find_results(root);
    for path in &documents {
        match check_document(path) {
            Ok(keys) => {
                writeln!(out, "ok    {} ({keys} keys)", path.display()).map_err(io_error)?;
            }
            Err(problem) => {
                tracing::warn!(path = %problem.path.display(), reason = %problem.reason, "results document does not decode");
                problems.push(problem);
            }
        }
    }
    for problem in &problems {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Red)))
            .map_err(io_error)?;
        write!(out, "FAIL").map_err(io_error)?;
        out.reset().map_err(io_error)?;
        writeln!(out, "  {}: {}", problem.path.display(), problem.reason).map_err(io_error)?;
    }
    writeln!(
        out,
        "checked {} documents, {} problems",
        documents.len(),
        problems.len()
    )
    .map_err(io_error)?;
    Ok(problems.is_empty())
}
