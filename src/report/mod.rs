//! The report handed to sinks.
//!
//! An [`ErrorReport`] is plain data: every field serializes with `serde`
//! under a camelCase name, and the extra context entries are flattened into
//! the top level as strings.
//!
//! ```rust
//! # use faultscan::report::ErrorReport;
//! fn log_report(report: &ErrorReport) {
//!     let json = serde_json::to_string(report).unwrap();
//!     println!("{json}");
//! }
//! ```

pub mod assemble;

use chrono::{DateTime, Local};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::options::Level;

/// Top-level field names. Extra entries with one of these names are stored
/// under `context_<name>` instead.
pub const FIELD_NAMES: [&str; 7] = [
    "error",
    "location",
    "codeContext",
    "stackTrace",
    "rawTrace",
    "highlightedCode",
    "configuration",
];

/// A structured description of one caught fault.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    /// What failed.
    pub error: ErrorRecord,
    /// Where it failed, if any frame is known.
    pub location: Option<Location>,
    /// Source lines around the failure.
    pub code_context: Option<CodeWindow>,
    /// Frames from the failure outwards.
    pub stack_trace: Vec<FrameRecord>,
    /// The fault and its chain as plain text.
    pub raw_trace: String,
    /// `code_context` prepared for display.
    pub highlighted_code: Option<HighlightedCode>,
    /// The options the report was built with.
    pub configuration: ConfigurationSnapshot,
    /// Call arguments, context entries and function metadata.
    #[serde(flatten)]
    pub extra: IndexMap<String, String>,
}

impl ErrorReport {
    /// The kind name of the reported fault.
    pub fn kind(&self) -> &str {
        &self.error.kind
    }

    /// Looks up an extra entry.
    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }
}

/// The fault itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    /// The kind name.
    #[serde(rename = "type")]
    pub kind: String,
    /// The fault message.
    pub message: String,
    /// When the report was built, as `%Y-%m-%d %H:%M:%S` local time.
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Local>,
    /// The configured severity.
    pub level: Level,
    /// The fault followed by its causes and contexts.
    pub exception_chain: Vec<ChainLink>,
}

/// One fault in a chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainLink {
    /// The kind name.
    #[serde(rename = "type")]
    pub kind: String,
    /// The fault message.
    pub message: String,
    /// Position in the chain, starting at 0.
    pub index: usize,
    /// `true` for the reported fault.
    pub is_original: bool,
    /// How the next link relates to this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<Relation>,
    /// This fault's own trace text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

/// The edge between two chain links.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// The next link is the explicit cause.
    CausedBy,
    /// The next link was being handled when this one was thrown.
    ContextFor,
}

/// Where a fault was thrown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// The source file.
    pub filename: String,
    /// The failing line.
    pub line_number: u32,
    /// The failing function, or `<unknown>`.
    pub function_name: String,
    /// The text of the failing line, or empty.
    pub source_line: String,
    /// The module path, or the file name when unknown.
    pub module: String,
}

/// Up to ten lines on each side of the failing line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeWindow {
    /// The lines, in file order.
    pub lines: Vec<SourceLine>,
    /// The failing line number.
    pub error_line: u32,
}

/// A line of a [`CodeWindow`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLine {
    /// One-based line number.
    pub line_no: u32,
    /// The line without trailing whitespace.
    pub code: String,
    /// Whether this is the failing line.
    pub is_error_line: bool,
}

/// One frame of the stack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRecord {
    /// The source file.
    pub filename: String,
    /// The executing line.
    pub line_number: u32,
    /// The function name without its module path.
    pub function_name: String,
    /// The module path, or the file name when unknown.
    pub module: String,
    /// The executing line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Locals recorded at the throw site. Only the innermost frame has them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_variables: Option<IndexMap<String, String>>,
    /// Up to five lines on each side of the executing line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_context: Option<Vec<ContextLine>>,
}

/// A line of a frame's source context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextLine {
    /// One-based line number.
    pub line_no: u32,
    /// The line without trailing whitespace.
    pub code: String,
    /// Whether this is the executing line.
    pub is_current_line: bool,
}

/// A display-ready form of [`CodeWindow`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightedCode {
    /// The lines, in file order.
    pub lines: Vec<HighlightedLine>,
    /// The failing line number.
    pub error_line: u32,
    /// Position of the failing line in `lines`.
    pub error_line_index: Option<usize>,
}

/// A line of [`HighlightedCode`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightedLine {
    /// One-based line number.
    pub line_no: u32,
    /// The line without trailing whitespace.
    pub code: String,
    /// Where the line sits relative to the failing line.
    #[serde(rename = "type")]
    pub line_type: LineType,
    /// Leading whitespace, in characters.
    pub indent_level: usize,
}

/// The position of a [`HighlightedLine`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineType {
    /// Above the failing line.
    Before,
    /// The failing line.
    Error,
    /// Below the failing line.
    After,
}

/// The options a report was built with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSnapshot {
    /// See [`Options::capture_code_context`](crate::Options::capture_code_context).
    pub capture_code_context: bool,
    /// See [`Options::capture_locals`](crate::Options::capture_locals).
    pub capture_locals: bool,
    /// See [`Options::max_stack_depth`](crate::Options::max_stack_depth).
    pub max_stack_depth: usize,
    /// See [`Options::error_level`](crate::Options::error_level).
    pub error_level: Level,
}

mod timestamp {
    use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub(super) fn serialize<S: Serializer>(
        timestamp: &DateTime<Local>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&timestamp.format(FORMAT))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Local>, D::Error> {
        let text = String::deserialize(deserializer)?;
        let naive = NaiveDateTime::parse_from_str(&text, FORMAT).map_err(D::Error::custom)?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| D::Error::custom(format!("`{text}` does not exist in local time")))
    }
}
