//! Source windows around failing lines.

use hashbrown::HashMap;
use rustc_hash::FxBuildHasher;

use crate::report::{CodeWindow, ContextLine, SourceLine};

/// Lines shown on each side of the failing line.
pub const CODE_WINDOW_RADIUS: u32 = 10;

/// Lines shown on each side of a frame's executing line.
pub const FRAME_WINDOW_RADIUS: u32 = 5;

/// Source files read while building one report.
///
/// Each file is read at most once. Unreadable files are remembered as such.
#[derive(Debug, Default)]
pub struct SourceCache {
    files: HashMap<String, Option<Vec<String>>, FxBuildHasher>,
}

impl SourceCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The lines of `path` without trailing whitespace, or `None` if the file
    /// cannot be read as UTF-8 text.
    pub fn lines(&mut self, path: &str) -> Option<&[String]> {
        if !self.files.contains_key(path) {
            let lines = read_lines(path);
            self.files.insert(path.to_string(), lines);
        }
        self.files.get(path)?.as_deref()
    }

    /// The text of one line, without surrounding whitespace.
    pub fn line(&mut self, path: &str, line_number: u32) -> Option<String> {
        let index = usize::try_from(line_number.checked_sub(1)?).ok()?;
        self.lines(path)?
            .get(index)
            .map(|line| line.trim().to_string())
    }

    /// Up to [`CODE_WINDOW_RADIUS`] lines on each side of `line_number`.
    ///
    /// If the file cannot be read or the line is unknown (`0`), the window
    /// holds only the failing line, with `known_text` as its code.
    pub fn code_window(
        &mut self,
        path: &str,
        line_number: u32,
        known_text: Option<&str>,
    ) -> CodeWindow {
        let lines = match self.lines(path).filter(|_| line_number > 0) {
            Some(lines) => window(lines, line_number, CODE_WINDOW_RADIUS)
                .map(|(line_no, code)| SourceLine {
                    line_no,
                    code: code.to_string(),
                    is_error_line: line_no == line_number,
                })
                .collect(),
            None => vec![SourceLine {
                line_no: line_number,
                code: known_text.unwrap_or_default().to_string(),
                is_error_line: true,
            }],
        };

        CodeWindow {
            lines,
            error_line: line_number,
        }
    }

    /// Up to [`FRAME_WINDOW_RADIUS`] lines on each side of `line_number`, or
    /// `None` if the file cannot be read.
    pub fn frame_window(&mut self, path: &str, line_number: u32) -> Option<Vec<ContextLine>> {
        let lines = self.lines(path)?;
        Some(
            window(lines, line_number, FRAME_WINDOW_RADIUS)
                .map(|(line_no, code)| ContextLine {
                    line_no,
                    code: code.to_string(),
                    is_current_line: line_no == line_number,
                })
                .collect(),
        )
    }
}

fn read_lines(path: &str) -> Option<Vec<String>> {
    let text = std::fs::read_to_string(path).ok()?;
    Some(text.lines().map(|line| line.trim_end().to_string()).collect())
}

/// One-based line numbers and text of the lines within `radius` of `center`,
/// clipped to the file.
fn window(lines: &[String], center: u32, radius: u32) -> impl Iterator<Item = (u32, &str)> {
    let first = center.saturating_sub(radius).max(1);
    let last = center.saturating_add(radius);
    lines
        .iter()
        .zip(1u32..)
        .skip_while(move |(_, line_no)| *line_no < first)
        .take_while(move |(_, line_no)| *line_no <= last)
        .map(|(code, line_no)| (line_no, code.as_str()))
}
