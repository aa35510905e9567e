//! Textual diff rendering for mismatch reports.
//!
//! Expected and actual are merged against an empty common ancestor, so every
//! region where they disagree comes out as a conflict block and every region
//! where they agree is printed once.

use difference::{Changeset, Difference};
use std::fmt::Write as _;
use termcolor::{Color, ColorSpec, WriteColor};

pub const EXPECTED_MARKER: &str = "<<<<<<< EXPECTED";
pub const SEPARATOR_MARKER: &str = "=======";
pub const ACTUAL_MARKER: &str = ">>>>>>> ACTUAL";

/// A contiguous region of the merged output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hunk {
    Agreed(String),
    Conflict { expected: String, actual: String },
}

/// Splits expected/actual text into agreed regions and conflicts, line by line.
pub fn three_way_hunks(expected: &str, actual: &str) -> Vec<Hunk> {
    let changeset = Changeset::new(expected, actual, "\n");
    let mut hunks = Vec::new();
    let mut pending: Option<(String, String)> = None;

    for diff in changeset.diffs {
        match diff {
            Difference::Same(text) => {
                if let Some((expected, actual)) = pending.take() {
                    hunks.push(Hunk::Conflict { expected, actual });
                }
                hunks.push(Hunk::Agreed(text));
            }
            Difference::Rem(text) => {
                let (expected, _) = pending.get_or_insert_with(Default::default);
                push_line(expected, &text);
            }
            Difference::Add(text) => {
                let (_, actual) = pending.get_or_insert_with(Default::default);
                push_line(actual, &text);
            }
        }
    }
    if let Some((expected, actual)) = pending.take() {
        hunks.push(Hunk::Conflict { expected, actual });
    }
    hunks
}

fn push_line(buffer: &mut String, text: &str) {
    if !buffer.is_empty() {
        buffer.push('\n');
    }
    buffer.push_str(text);
}

/// Renders the merge with conflict markers. Returns `None` when the texts
/// do not conflict anywhere.
pub fn render_three_way(expected: &str, actual: &str) -> Option<String> {
    let hunks = three_way_hunks(expected, actual);
    if !hunks.iter().any(|h| matches!(h, Hunk::Conflict { .. })) {
        return None;
    }

    let mut out = String::new();
    for hunk in &hunks {
        match hunk {
            Hunk::Agreed(text) => {
                let _ = writeln!(out, "{text}");
            }
            Hunk::Conflict { expected, actual } => {
                let _ = writeln!(out, "{EXPECTED_MARKER}");
                if !expected.is_empty() {
                    let _ = writeln!(out, "{expected}");
                }
                let _ = writeln!(out, "{SEPARATOR_MARKER}");
                if !actual.is_empty() {
                    let _ = writeln!(out, "{actual}");
                }
                let _ = writeln!(out, "{ACTUAL_MARKER}");
            }
        }
    }
    Some(out)
}

/// Writes a rendered diff, colouring the expected side green and the actual side red.
pub fn write_colored_diff<W: WriteColor>(out: &mut W, rendered: &str) -> std::io::Result<()> {
    #[derive(Clone, Copy)]
    enum Side {
        Neither,
        Expected,
        Actual,
    }

    let mut side = Side::Neither;
    for line in rendered.lines() {
        match line {
            EXPECTED_MARKER => side = Side::Expected,
            SEPARATOR_MARKER => side = Side::Actual,
            ACTUAL_MARKER => {
                out.reset()?;
                writeln!(out, "{line}")?;
                side = Side::Neither;
                continue;
            }
            _ => {}
        }
        match side {
            Side::Neither => out.reset()?,
            Side::Expected => out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?,
            Side::Actual => out.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?,
        }
        writeln!(out, "{line}")?;
    }
    out.reset()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_texts_have_no_conflicts() {
        assert_eq!(render_three_way("a\nb", "a\nb"), None);
    }

    #[test]
    fn changed_line_becomes_conflict_block() {
        let rendered = render_three_way("a\nb\nc", "a\nx\nc").unwrap();
        assert_eq!(
            rendered,
            "a\n<<<<<<< EXPECTED\nb\n=======\nx\n>>>>>>> ACTUAL\nc\n"
        );
    }

    #[test]
    fn added_lines_have_empty_expected_side() {
        let hunks = three_way_hunks("a", "a\nb");
        assert_eq!(
            hunks,
            vec![
                Hunk::Agreed("a".to_string()),
                Hunk::Conflict {
                    expected: String::new(),
                    actual: "b".to_string()
                }
            ]
        );
    }

    #[test]
    fn colored_output_keeps_text() {
        let mut buffer = termcolor::Buffer::no_color();
        write_colored_diff(&mut buffer, "a\n<<<<<<< EXPECTED\nb\n=======\nx\n>>>>>>> ACTUAL\n").unwrap();
        let text = String::from_utf8(buffer.into_inner()).unwrap();
        assert!(text.contains("<<<<<<< EXPECTED\nb\n=======\nx\n>>>>>>> ACTUAL"));
    }
}
