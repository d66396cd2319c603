#![deny(
    missing_docs,
    unsafe_code,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]

//! Stack capture for faultscan, built on the `backtrace` crate.
//!
//! Faults capture their call stack when they are created, through the
//! [`TraceCollector`] hook. This crate provides a collector that walks the
//! real stack, drops the frames that only belong to error plumbing, and hands
//! the rest to faultscan as a [`Trace`].
//!
//! # Quick Start
//!
//! ```rust
//! use faultscan::hooks::Hooks;
//! use faultscan_backtrace::BacktraceCollector;
//!
//! Hooks::new()
//!     .trace_collector(BacktraceCollector::new_from_env())
//!     .capture_panic_sites()
//!     .install()
//!     .expect("failed to install hooks");
//! ```
//!
//! Without a collector, reports carry a single frame: the place the fault was
//! thrown.
//!
//! # Environment Variables
//!
//! - `RUST_BACKTRACE=full` - Disables filtering and shows full paths
//! - `FAULTSCAN_BACKTRACE` - Comma-separated options:
//!   - `full` - Disables filtering
//!   - `full_paths` - Show full file paths when a [`Backtrace`] is printed
//!
//! # Debugging symbols in release builds
//!
//! Frames only resolve to functions and lines when debug information is
//! available. Keep it in release builds:
//!
//! ```toml
//! [profile.release]
//! strip = false
//! # You can also set this to "line-tables-only" for smaller binaries
//! debug = true
//! ```
//!
//! # Filtering
//!
//! ```rust
//! use faultscan_backtrace::{BacktraceCollector, BacktraceFilter};
//!
//! let collector = BacktraceCollector {
//!     filter: BacktraceFilter {
//!         skipped_initial_crates: &["faultscan", "faultscan-backtrace"],
//!         skipped_middle_crates: &["tokio"],
//!         skipped_final_crates: &["std"],
//!         max_entry_count: 15,
//!         show_full_path: false,
//!     },
//! };
//! ```

use std::{borrow::Cow, fmt, panic::Location, sync::OnceLock};

use backtrace::BytesOrWideString;
use faultscan::{
    hooks::{HooksAlreadyInstalledError, Hooks, trace::TraceCollector},
    trace::{Trace, TraceFrame},
};

/// A captured and filtered stack.
///
/// # Examples
///
/// ```rust
/// use faultscan_backtrace::{Backtrace, BacktraceFilter};
///
/// if let Some(backtrace) = Backtrace::capture(&BacktraceFilter::DEFAULT) {
///     println!("{backtrace}");
/// }
/// ```
#[derive(Debug)]
pub struct Backtrace {
    /// The entries, ordered from most recent to oldest.
    pub entries: Vec<BacktraceEntry>,
    /// Total number of frames that were omitted due to filtering.
    pub total_omitted_frames: usize,
    show_full_path: bool,
}

/// A single entry in a [`Backtrace`].
#[derive(Debug)]
pub enum BacktraceEntry {
    /// A normal stack frame.
    Frame(Frame),
    /// A run of omitted frames from one crate.
    OmittedFrames {
        /// Number of omitted frames.
        count: usize,
        /// The crate whose frames were omitted.
        skipped_crate: &'static str,
    },
}

/// A single stack frame.
#[derive(Debug)]
pub struct Frame {
    /// The demangled symbol name, without its hash.
    pub sym_demangled: String,
    /// File path information, if available.
    pub frame_path: Option<FramePath>,
    /// Line number in the source file, if available.
    pub lineno: Option<u32>,
}

/// File path information for a stack frame.
#[derive(Debug)]
pub struct FramePath {
    /// The raw file path from the debug information.
    pub raw_path: String,
    /// The crate the file belongs to, if it could be detected.
    pub crate_name: Option<Cow<'static, str>>,
    /// Known prefix of the path, used to shorten it for display.
    pub split_path: Option<FramePrefix>,
}

/// A file path split at a known prefix.
#[derive(Debug)]
pub struct FramePrefix {
    /// The kind of prefix: `"RUST_SRC"`, `"CARGO"` or `"FAULTSCAN"`.
    pub prefix_kind: &'static str,
    /// The prefix that was removed from the path.
    pub prefix: String,
    /// The rest of the path, such as `indexmap-2.12.1/src/map.rs`.
    pub suffix: String,
}

/// Configuration for filtering frames by crate.
///
/// Initial crates are hidden while they lead the stack, which removes the
/// capturing machinery itself. Middle crates are collapsed into a single
/// entry. Final crates are hidden at the bottom of the stack, which removes
/// runtime startup frames.
///
/// # Examples
///
/// ```rust
/// use faultscan_backtrace::BacktraceFilter;
///
/// let filter = BacktraceFilter {
///     skipped_middle_crates: &["tokio", "hyper", "tower"],
///     max_entry_count: 10,
///     ..BacktraceFilter::DEFAULT
/// };
/// ```
#[derive(Copy, Clone, Debug)]
pub struct BacktraceFilter {
    /// Crates hidden at the beginning of a backtrace.
    pub skipped_initial_crates: &'static [&'static str],
    /// Crates collapsed in the middle of a backtrace.
    pub skipped_middle_crates: &'static [&'static str],
    /// Crates hidden at the end of a backtrace.
    pub skipped_final_crates: &'static [&'static str],
    /// Maximum number of entries to keep.
    pub max_entry_count: usize,
    /// Whether printed backtraces show full file paths.
    pub show_full_path: bool,
}

impl BacktraceFilter {
    /// Default filter settings.
    pub const DEFAULT: Self = Self {
        skipped_initial_crates: &[
            "backtrace",
            "faultscan",
            "faultscan-backtrace",
            "core",
            "std",
            "alloc",
        ],
        skipped_middle_crates: &["std", "core", "alloc", "tokio"],
        skipped_final_crates: &["std", "core", "alloc", "tokio"],
        max_entry_count: 20,
        show_full_path: false,
    };

    /// Keeps every frame.
    pub const UNFILTERED: Self = Self {
        skipped_initial_crates: &[],
        skipped_middle_crates: &[],
        skipped_final_crates: &[],
        max_entry_count: usize::MAX,
        show_full_path: true,
    };
}

impl Default for BacktraceFilter {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A [`TraceCollector`] capturing the real stack of the thread creating a
/// fault.
///
/// # Examples
///
/// ```rust
/// use faultscan::hooks::Hooks;
/// use faultscan_backtrace::{BacktraceCollector, BacktraceFilter};
///
/// let collector = BacktraceCollector {
///     filter: BacktraceFilter {
///         max_entry_count: 30,
///         ..BacktraceFilter::DEFAULT
///     },
/// };
///
/// Hooks::new()
///     .trace_collector(collector)
///     .install()
///     .expect("failed to install hooks");
/// ```
#[derive(Copy, Clone, Debug, Default)]
pub struct BacktraceCollector {
    /// Which frames to keep.
    pub filter: BacktraceFilter,
}

#[derive(Debug)]
struct FaultscanEnvOptions {
    unfiltered: bool,
    show_full_path: bool,
}

impl FaultscanEnvOptions {
    fn get() -> &'static Self {
        static FAULTSCAN_FLAGS: OnceLock<FaultscanEnvOptions> = OnceLock::new();

        FAULTSCAN_FLAGS.get_or_init(|| {
            let rust_backtrace_full =
                std::env::var_os("RUST_BACKTRACE").is_some_and(|var| var == "full");
            let mut unfiltered = rust_backtrace_full;
            let mut show_full_path = rust_backtrace_full;
            if let Some(var) = std::env::var_os("FAULTSCAN_BACKTRACE") {
                for v in var.to_string_lossy().split(',') {
                    let v = v.trim();
                    if v.eq_ignore_ascii_case("full") {
                        unfiltered = true;
                    } else if v.eq_ignore_ascii_case("full_paths") {
                        show_full_path = true;
                    }
                }
            }
            FaultscanEnvOptions {
                unfiltered,
                show_full_path,
            }
        })
    }
}

impl BacktraceCollector {
    /// Creates a collector configured by the environment.
    ///
    /// `RUST_BACKTRACE=full` or `FAULTSCAN_BACKTRACE=full` turn filtering
    /// off. `FAULTSCAN_BACKTRACE=full_paths` keeps the filter but prints full
    /// paths.
    pub fn new_from_env() -> Self {
        let env_options = FaultscanEnvOptions::get();
        let filter = if env_options.unfiltered {
            BacktraceFilter {
                show_full_path: env_options.show_full_path,
                ..BacktraceFilter::UNFILTERED
            }
        } else {
            BacktraceFilter {
                show_full_path: env_options.show_full_path,
                ..BacktraceFilter::DEFAULT
            }
        };
        Self { filter }
    }
}

impl TraceCollector for BacktraceCollector {
    fn collect(&self) -> Option<Trace> {
        Backtrace::capture(&self.filter).map(Backtrace::into_trace)
    }
}

/// Installs a [`BacktraceCollector`] configured by the environment, together
/// with panic site capture.
///
/// # Errors
///
/// Fails when hooks were already installed.
#[track_caller]
pub fn install() -> Result<(), HooksAlreadyInstalledError> {
    Hooks::new()
        .trace_collector(BacktraceCollector::new_from_env())
        .capture_panic_sites()
        .install()
}

fn get_function_name(s: &str) -> &str {
    let mut word_start = 0usize;
    let mut word_end = 0usize;
    let mut angle_nesting_level = 0u64;
    let mut curly_nesting_level = 0u64;
    let mut potential_function_arrow = false;
    let mut inside_word = false;

    for (i, c) in s.char_indices() {
        if curly_nesting_level == 0 && angle_nesting_level == 0 {
            if !inside_word && unicode_ident::is_xid_start(c) {
                word_start = i;
                inside_word = true;
            } else if inside_word && !unicode_ident::is_xid_continue(c) {
                word_end = i;
                inside_word = false;
            }
        }

        let was_potential_function_arrow = potential_function_arrow;
        potential_function_arrow = c == '-';

        if c == '<' {
            angle_nesting_level = angle_nesting_level.saturating_add(1);
        } else if c == '>' && !was_potential_function_arrow {
            angle_nesting_level = angle_nesting_level.saturating_sub(1);
        } else if c == '{' {
            curly_nesting_level = curly_nesting_level.saturating_add(1);
            if !inside_word && curly_nesting_level == 1 && angle_nesting_level == 0 {
                word_start = i;
                inside_word = true;
            }
        } else if c == '}' {
            curly_nesting_level = curly_nesting_level.saturating_sub(1);
            if inside_word && curly_nesting_level == 0 {
                word_end = i + 1;
                inside_word = false;
            }
        }
    }

    if word_start < word_end {
        &s[word_start..word_end]
    } else {
        &s[word_start..]
    }
}

impl fmt::Display for Backtrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MAX_UNWRAPPED_SYM_LENGTH: usize = 25;
        let max_seen_length = self
            .frames()
            .map(|frame| get_function_name(&frame.sym_demangled).len())
            .filter(|&len| len <= MAX_UNWRAPPED_SYM_LENGTH)
            .max()
            .unwrap_or(0);

        for entry in &self.entries {
            match entry {
                BacktraceEntry::OmittedFrames {
                    count,
                    skipped_crate,
                } => {
                    writeln!(
                        f,
                        "... omitted {count} frame(s) from crate '{skipped_crate}' ..."
                    )?;
                }
                BacktraceEntry::Frame(frame) => {
                    let sym = get_function_name(&frame.sym_demangled);
                    if sym.len() <= MAX_UNWRAPPED_SYM_LENGTH {
                        write!(f, "{sym:<max_seen_length$} - ")?;
                    } else {
                        write!(f, "{sym}\n   - ")?;
                    }

                    if let Some(path) = &frame.frame_path {
                        match &path.split_path {
                            Some(split_path) if !self.show_full_path => {
                                write!(f, "[..]/{}", split_path.suffix)?;
                            }
                            _ => write!(f, "{}", path.raw_path)?,
                        }
                        if let Some(lineno) = frame.lineno {
                            write!(f, ":{lineno}")?;
                        }
                    }
                    writeln!(f)?;
                }
            }
        }

        if self.total_omitted_frames > 0 {
            writeln!(
                f,
                "note: {} frame(s) omitted. For a complete backtrace, set FAULTSCAN_BACKTRACE=full.",
                self.total_omitted_frames
            )?;
        }

        Ok(())
    }
}

const fn get_faultscan_matcher(
    location: &'static Location<'static>,
) -> Option<(&'static str, usize)> {
    let file = location.file();

    let Some(prefix_len) = file.len().checked_sub("/src/lib.rs".len()) else {
        return None;
    };

    let (prefix, suffix) = file.split_at(prefix_len);
    if std::path::MAIN_SEPARATOR == '/' {
        assert!(suffix.eq_ignore_ascii_case("/src/lib.rs"));
    } else {
        assert!(suffix.eq_ignore_ascii_case(r#"/src\lib.rs"#));
    }

    let (matcher_prefix, _) = file.split_at(prefix_len + 4);

    let mut splitter_prefix = prefix;
    while !splitter_prefix.is_empty() {
        let (new_prefix, last_char) = splitter_prefix.split_at(splitter_prefix.len() - 1);
        splitter_prefix = new_prefix;
        if last_char.eq_ignore_ascii_case(std::path::MAIN_SEPARATOR_STR) {
            break;
        }
    }

    Some((matcher_prefix, splitter_prefix.len()))
}

const FAULTSCAN_BACKTRACE_MATCHER: Option<(&str, usize)> =
    get_faultscan_matcher(Location::caller());
const FAULTSCAN_MATCHER: Option<(&str, usize)> =
    get_faultscan_matcher(faultscan::__private::FAULTSCAN_LOCATION);

impl Backtrace {
    /// Captures the stack of the calling thread, applying `filter`.
    ///
    /// Returns `None` when no frame could be resolved at all.
    pub fn capture(filter: &BacktraceFilter) -> Option<Self> {
        let mut initial_filtering = !filter.skipped_initial_crates.is_empty();
        let mut entries: Vec<BacktraceEntry> = Vec::new();
        let mut total_omitted_frames = 0;

        let mut delayed_omitted_frame: Option<Frame> = None;
        let mut currently_omitted_crate_name: Option<&'static str> = None;
        let mut currently_omitted_frames = 0;

        backtrace::trace(|frame| {
            backtrace::resolve_frame(frame, |symbol| {
                let (Some(sym), Some(filename_raw)) = (symbol.name(), symbol.filename_raw()) else {
                    return;
                };

                if entries.len() >= filter.max_entry_count {
                    total_omitted_frames += 1;
                    return;
                }

                let sym_demangled = format!("{sym:#}");
                let frame_path = FramePath::new(filename_raw, &sym_demangled);

                if initial_filtering {
                    if let Some(cur_crate_name) = &frame_path.crate_name
                        && filter.skipped_initial_crates.contains(&&**cur_crate_name)
                    {
                        total_omitted_frames += 1;
                        return;
                    } else {
                        initial_filtering = false;
                    }
                }

                if let Some(cur_crate_name) = &frame_path.crate_name
                    && let Some(currently_omitted_crate_name) = &currently_omitted_crate_name
                    && cur_crate_name == currently_omitted_crate_name
                {
                    delayed_omitted_frame = None;
                    currently_omitted_frames += 1;
                    total_omitted_frames += 1;
                    return;
                }

                if let Some(currently_omitted_crate_name) = currently_omitted_crate_name.take() {
                    if let Some(delayed_frame) = delayed_omitted_frame.take() {
                        total_omitted_frames -= 1;
                        entries.push(BacktraceEntry::Frame(delayed_frame));
                    } else {
                        entries.push(BacktraceEntry::OmittedFrames {
                            count: currently_omitted_frames,
                            skipped_crate: currently_omitted_crate_name,
                        });
                    }
                    currently_omitted_frames = 0;
                }

                let frame = Frame {
                    sym_demangled,
                    frame_path: Some(frame_path),
                    lineno: symbol.lineno(),
                };

                let skipped_crate = frame.crate_name().and_then(|cur_crate_name| {
                    filter
                        .skipped_middle_crates
                        .iter()
                        .copied()
                        .find(|&crate_name| crate_name == cur_crate_name)
                });
                if let Some(skipped_crate) = skipped_crate {
                    currently_omitted_crate_name = Some(skipped_crate);
                    currently_omitted_frames = 1;
                    total_omitted_frames += 1;
                    delayed_omitted_frame = Some(frame);
                    return;
                }

                entries.push(BacktraceEntry::Frame(frame));
            });

            true
        });

        if let Some(currently_omitted_crate_name) = currently_omitted_crate_name.take() {
            if let Some(delayed_frame) = delayed_omitted_frame.take() {
                total_omitted_frames -= 1;
                entries.push(BacktraceEntry::Frame(delayed_frame));
            } else {
                entries.push(BacktraceEntry::OmittedFrames {
                    count: currently_omitted_frames,
                    skipped_crate: currently_omitted_crate_name,
                });
            }
        }

        while let Some(last) = entries.last() {
            match last {
                BacktraceEntry::Frame(frame) => {
                    let skip = frame
                        .crate_name()
                        .is_some_and(|crate_name| filter.skipped_final_crates.contains(&crate_name))
                        || is_libc_start_frame(frame);
                    if skip {
                        total_omitted_frames += 1;
                        entries.pop();
                    } else {
                        break;
                    }
                }
                BacktraceEntry::OmittedFrames {
                    skipped_crate,
                    count,
                } => {
                    if filter.skipped_final_crates.contains(skipped_crate) {
                        total_omitted_frames += count;
                        entries.pop();
                    } else {
                        break;
                    }
                }
            }
        }

        if entries.is_empty() && total_omitted_frames == 0 {
            None
        } else {
            Some(Self {
                entries,
                total_omitted_frames,
                show_full_path: filter.show_full_path,
            })
        }
    }

    /// The frames that survived filtering, most recent first.
    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.entries.iter().filter_map(|entry| match entry {
            BacktraceEntry::Frame(frame) => Some(frame),
            BacktraceEntry::OmittedFrames { .. } => None,
        })
    }

    /// Converts the backtrace into the [`Trace`] faults carry.
    ///
    /// Frames keep their raw paths so that reports can read source lines.
    pub fn into_trace(self) -> Trace {
        let frames = self
            .entries
            .into_iter()
            .filter_map(|entry| match entry {
                BacktraceEntry::Frame(frame) => Some(frame.into_trace_frame()),
                BacktraceEntry::OmittedFrames { .. } => None,
            })
            .collect();
        Trace {
            frames,
            omitted_frames: self.total_omitted_frames,
        }
    }
}

impl Frame {
    fn crate_name(&self) -> Option<&str> {
        self.frame_path.as_ref()?.crate_name.as_deref()
    }

    fn into_trace_frame(self) -> TraceFrame {
        let filename = self
            .frame_path
            .map(|path| path.raw_path)
            .unwrap_or_default();
        TraceFrame::from_symbol(&self.sym_demangled, filename, self.lineno.unwrap_or(0))
    }
}

fn is_libc_start_frame(frame: &Frame) -> bool {
    frame.sym_demangled == "__libc_start_call_main"
        || frame.sym_demangled == "__libc_start_main_impl"
        || (frame.sym_demangled == "_start"
            && frame
                .frame_path
                .as_ref()
                .is_some_and(|path| path.raw_path.contains("zig/libc/glibc")))
}

/// Crates recognized by symbol when their sources sit at a path that gives no
/// hint, such as inside a workspace.
const SYMBOL_CRATES: &[(&str, &str)] = &[
    ("faultscan_backtrace::", "faultscan-backtrace"),
    ("faultscan::", "faultscan"),
    ("backtrace::", "backtrace"),
];

fn crate_from_symbol(sym_demangled: &str) -> Option<&'static str> {
    let sym = sym_demangled.trim_start_matches('<');
    SYMBOL_CRATES
        .iter()
        .find(|(prefix, _)| sym.starts_with(prefix))
        .map(|&(_, crate_name)| crate_name)
}

impl FramePath {
    fn new(path: BytesOrWideString<'_>, sym_demangled: &str) -> Self {
        static REGEXES: OnceLock<Option<[regex::Regex; 2]>> = OnceLock::new();
        let regexes = REGEXES.get_or_init(|| {
            Some([
                // Rust standard library paths:
                // - /lib/rustlib/src/rust/library/{std|core|alloc}/src/...
                // - /rustc/{40-char-hash}/library/{std|core|alloc}/src/...
                regex::Regex::new(
                    r"(?:/lib/rustlib/src/rust|^/rustc/[0-9a-f]{40})/library/(std|core|alloc)/src/.*$",
                )
                .ok()?,
                // Cargo registry paths:
                // - /.cargo/registry/src/{index}-{16-char-hash}/{crate}-{version}/src/...
                regex::Regex::new(
                    r"/\.cargo/registry/src/[^/]+-[0-9a-f]{16}/([^./]+)-[0-9]+\.[^/]*/src/.*$",
                )
                .ok()?,
            ])
        });

        let path_str = path.to_string();
        let raw_path = path.to_str_lossy().into_owned();

        let known = regexes.iter().flatten().zip(["RUST_SRC", "CARGO"]).find_map(
            |(regex, prefix_kind)| {
                let crate_capture = regex.captures(&path_str)?.get(1)?;
                let split = crate_capture.start();
                Some((
                    prefix_kind,
                    crate_capture.as_str().to_string(),
                    split.saturating_sub(1),
                    split,
                ))
            },
        );
        if let Some((prefix_kind, crate_name, prefix_end, suffix_start)) = known {
            return Self {
                split_path: Some(FramePrefix {
                    prefix_kind,
                    prefix: path_str[..prefix_end].to_string(),
                    suffix: path_str[suffix_start..].to_string(),
                }),
                crate_name: Some(Cow::Owned(crate_name)),
                raw_path,
            };
        }

        let matchers = [
            (FAULTSCAN_MATCHER, "faultscan"),
            (FAULTSCAN_BACKTRACE_MATCHER, "faultscan-backtrace"),
        ];
        for (matcher, crate_name) in matchers {
            if let Some((matcher_prefix, splitter_prefix_len)) = matcher
                && path_str.starts_with(matcher_prefix)
            {
                return Self {
                    split_path: Some(FramePrefix {
                        prefix_kind: "FAULTSCAN",
                        prefix: path_str[..splitter_prefix_len].to_string(),
                        suffix: path_str[splitter_prefix_len + 1..].to_string(),
                    }),
                    crate_name: Some(Cow::Borrowed(crate_name)),
                    raw_path,
                };
            }
        }

        Self {
            raw_path,
            crate_name: crate_from_symbol(sym_demangled).map(Cow::Borrowed),
            split_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn test_get_function_name() {
        assert_eq!(get_function_name("app::ops::divide"), "divide");
        assert_eq!(
            get_function_name("<app::Ledger as core::fmt::Display>::fmt"),
            "fmt"
        );
        assert_eq!(get_function_name("app::run::{{closure}}"), "{{closure}}");
        assert_eq!(
            get_function_name("app::apply<fn() -> u8>::inner"),
            "inner"
        );
    }

    #[test]
    fn test_registry_path_is_classified() {
        let raw = "/home/dev/.cargo/registry/src/index.crates.io-1949cf8c6b5b557f/tokio-1.48.0/src/runtime/park.rs";
        let path = FramePath::new(BytesOrWideString::Bytes(raw.as_bytes()), "tokio::runtime::park::park");
        assert_eq!(path.crate_name.as_deref(), Some("tokio"));
        let split = path.split_path.unwrap();
        assert_eq!(split.prefix_kind, "CARGO");
        assert_eq!(split.suffix, "tokio-1.48.0/src/runtime/park.rs");
        assert_eq!(path.raw_path, raw);
    }

    #[test]
    fn test_std_path_is_classified() {
        let raw = "/rustc/0123456789abcdef0123456789abcdef01234567/library/std/src/panicking.rs";
        let path = FramePath::new(BytesOrWideString::Bytes(raw.as_bytes()), "std::panicking::try");
        assert_eq!(path.crate_name.as_deref(), Some("std"));
        assert_eq!(path.split_path.unwrap().prefix_kind, "RUST_SRC");
    }

    #[test]
    fn test_unknown_path_falls_back_to_symbol() {
        let path = FramePath::new(
            BytesOrWideString::Bytes(b"/srv/app/src/fault.rs"),
            "<faultscan::fault::Fault>::new",
        );
        assert_eq!(path.crate_name.as_deref(), Some("faultscan"));

        let path = FramePath::new(
            BytesOrWideString::Bytes(b"/srv/app/faultscan-backtrace/src/lib.rs"),
            "<faultscan_backtrace::BacktraceCollector as faultscan::hooks::trace::TraceCollector>::collect",
        );
        assert_eq!(path.crate_name.as_deref(), Some("faultscan-backtrace"));

        let path = FramePath::new(
            BytesOrWideString::Bytes(b"/srv/app/faultscan-backtrace/src/lib.rs"),
            "faultscan_backtrace::Backtrace::capture",
        );
        assert_eq!(path.crate_name.as_deref(), Some("faultscan-backtrace"));

        let path = FramePath::new(BytesOrWideString::Bytes(b"/srv/app/src/main.rs"), "app::main");
        assert!(path.crate_name.is_none());
        assert!(path.split_path.is_none());
    }

    #[test]
    fn test_default_filter() {
        let filter = BacktraceFilter::default();
        assert!(filter.skipped_initial_crates.contains(&"faultscan"));
        assert!(filter.skipped_final_crates.contains(&"tokio"));
        assert_eq!(filter.max_entry_count, 20);
        assert!(!filter.show_full_path);
    }

    #[inline(never)]
    fn capture_here(filter: &BacktraceFilter) -> Option<Trace> {
        BacktraceCollector { filter: *filter }.collect()
    }

    #[test]
    fn test_collector_captures_calling_frames() {
        let Some(trace) = capture_here(&BacktraceFilter::UNFILTERED) else {
            // Debug information is not available on this target.
            return;
        };
        assert!(!trace.is_empty());
        assert!(
            trace
                .frames
                .iter()
                .any(|frame| frame.function == "test_collector_captures_calling_frames")
        );
        assert!(
            trace
                .frames
                .iter()
                .filter(|frame| frame.line_number > 0)
                .all(|frame| !frame.filename.is_empty())
        );
    }

    #[test]
    fn test_max_entry_count_bounds_frames() {
        let filter = BacktraceFilter {
            max_entry_count: 2,
            ..BacktraceFilter::UNFILTERED
        };
        let Some(backtrace) = Backtrace::capture(&filter) else {
            return;
        };
        assert!(backtrace.entries.len() <= 2);
        assert!(backtrace.total_omitted_frames > 0);
        let printed = backtrace.to_string();
        assert!(printed.contains("frame(s) omitted"));
        let trace = backtrace.into_trace();
        assert!(trace.frames.len() <= 2);
        assert!(trace.omitted_frames > 0);
    }

    #[test]
    fn test_matcher_for_this_crate() {
        if let Some((prefix, _)) = FAULTSCAN_BACKTRACE_MATCHER {
            assert!(Path::new(prefix).ends_with("src"));
        }
    }
}
