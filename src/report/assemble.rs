//! Pure assembly of [`ErrorReport`]s from captured pieces.

use chrono::{DateTime, Local};
use indexmap::IndexMap;

use super::{
    ChainLink, CodeWindow, ConfigurationSnapshot, ErrorRecord, ErrorReport, FIELD_NAMES,
    FrameRecord, HighlightedCode, HighlightedLine, LineType, Location,
};
use crate::options::Level;

/// Everything a report is made of.
#[derive(Clone, Debug)]
pub struct ReportParts {
    /// The kind name of the reported fault.
    pub kind: String,
    /// The fault message.
    pub message: String,
    /// The configured severity.
    pub level: Level,
    /// When the report is built.
    pub timestamp: DateTime<Local>,
    /// The walked chain.
    pub chain: Vec<ChainLink>,
    /// The innermost known frame.
    pub location: Option<Location>,
    /// Source lines around `location`.
    pub code_context: Option<CodeWindow>,
    /// The walked frames.
    pub stack_trace: Vec<FrameRecord>,
    /// The chain as text.
    pub raw_trace: String,
    /// The options in effect.
    pub configuration: ConfigurationSnapshot,
    /// Extra entries in merge order. Later entries win.
    pub extra: Vec<(String, String)>,
}

/// Combines `parts` into a report.
///
/// Extra keys that clash with a top-level field are stored as
/// `context_<key>`. A later entry under the same key replaces the earlier
/// value but keeps its position.
pub fn assemble(parts: ReportParts) -> ErrorReport {
    let highlighted_code = parts.code_context.as_ref().and_then(highlight);

    let mut extra = IndexMap::with_capacity(parts.extra.len());
    for (key, value) in parts.extra {
        let key = if FIELD_NAMES.contains(&key.as_str()) {
            format!("context_{key}")
        } else {
            key
        };
        extra.insert(key, value);
    }

    ErrorReport {
        error: ErrorRecord {
            kind: parts.kind,
            message: parts.message,
            timestamp: parts.timestamp,
            level: parts.level,
            exception_chain: parts.chain,
        },
        location: parts.location,
        code_context: parts.code_context,
        stack_trace: parts.stack_trace,
        raw_trace: parts.raw_trace,
        highlighted_code,
        configuration: parts.configuration,
        extra,
    }
}

/// Labels each line of `window` relative to the failing line.
///
/// Returns `None` for an empty window.
pub fn highlight(window: &CodeWindow) -> Option<HighlightedCode> {
    if window.lines.is_empty() {
        return None;
    }

    let mut error_line_index = None;
    let lines = window
        .lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let line_type = if line.is_error_line {
                error_line_index = Some(index);
                LineType::Error
            } else if line.line_no < window.error_line {
                LineType::Before
            } else {
                LineType::After
            };
            HighlightedLine {
                line_no: line.line_no,
                code: line.code.clone(),
                line_type,
                indent_level: line.code.chars().take_while(|c| c.is_whitespace()).count(),
            }
        })
        .collect();

    Some(HighlightedCode {
        lines,
        error_line: window.error_line,
        error_line_index,
    })
}
