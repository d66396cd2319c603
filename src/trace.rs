//! Captured call stacks.
//!
//! A [`Trace`] is the backend-neutral form of a stack captured when a fault is
//! created. Backends such as `faultscan-backtrace` produce it through the
//! [`TraceCollector`](crate::hooks::trace::TraceCollector) hook; the stack
//! walker later turns it into report frames.

use core::fmt;

/// A call stack, ordered from the innermost frame (where the fault was
/// created) outwards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Trace {
    /// The captured frames, innermost first.
    pub frames: Vec<TraceFrame>,
    /// Number of frames the backend filtered out.
    pub omitted_frames: usize,
}

/// A single frame of a [`Trace`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceFrame {
    /// The function name without its module path.
    pub function: String,
    /// The module path of the function, if known.
    pub module: Option<String>,
    /// The source file of the frame.
    pub filename: String,
    /// The line being executed in `filename`.
    pub line_number: u32,
}

impl TraceFrame {
    /// Creates a frame from a demangled symbol such as `my_crate::ops::divide`.
    pub fn from_symbol(symbol: &str, filename: impl Into<String>, line_number: u32) -> Self {
        let (module, function) = split_symbol(symbol);
        Self {
            function: function.to_string(),
            module: module.map(str::to_string),
            filename: filename.into(),
            line_number,
        }
    }

    /// Creates a frame that only knows its source position.
    pub fn from_location(location: &core::panic::Location<'_>) -> Self {
        Self {
            function: String::from("<unknown>"),
            module: None,
            filename: location.file().to_string(),
            line_number: location.line(),
        }
    }

    /// Returns `true` for frames of this crate's own types and trait impls,
    /// and of `faultscan-backtrace`.
    ///
    /// ```
    /// use faultscan::trace::TraceFrame;
    ///
    /// let frame = TraceFrame::from_symbol("faultscan::fault::Fault::new", "src/fault.rs", 80);
    /// assert!(frame.is_faultscan_frame());
    /// let frame = TraceFrame::from_symbol("app::ops::divide", "src/ops.rs", 4);
    /// assert!(!frame.is_faultscan_frame());
    /// ```
    pub fn is_faultscan_frame(&self) -> bool {
        const CRATES: [&str; 2] = ["faultscan", "faultscan_backtrace"];
        let Some(module) = &self.module else {
            return false;
        };
        let self_type = module.trim_start_matches('<');
        let trait_path = module.split_once(" as ").map(|(_, path)| path);
        CRATES.iter().any(|name| {
            [Some(self_type), trait_path].into_iter().flatten().any(|path| {
                path.strip_prefix(name)
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
            })
        })
    }

    /// The module name shown in reports.
    ///
    /// Falls back to the file name when no module path is known.
    pub fn module_or_file(&self) -> &str {
        match &self.module {
            Some(module) => module,
            None => file_name(&self.filename),
        }
    }
}

impl Trace {
    /// Creates a trace from frames ordered innermost first.
    pub fn new(frames: Vec<TraceFrame>) -> Self {
        Self {
            frames,
            omitted_frames: 0,
        }
    }

    /// Returns `true` if the trace holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The frame where the fault was created.
    pub fn innermost(&self) -> Option<&TraceFrame> {
        self.frames.first()
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in &self.frames {
            writeln!(f, "{frame}")?;
        }
        if self.omitted_frames > 0 {
            writeln!(f, "   ... {} frame(s) omitted", self.omitted_frames)?;
        }
        Ok(())
    }
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "   at {} ({}:{})",
            self.function, self.filename, self.line_number
        )
    }
}

/// Splits `a::b::c` into `(Some("a::b"), "c")`, ignoring path separators that
/// appear inside generic arguments.
pub(crate) fn split_symbol(symbol: &str) -> (Option<&str>, &str) {
    let mut depth = 0usize;
    let mut split_at = None;
    let bytes = symbol.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                split_at = Some(i);
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }

    match split_at {
        Some(at) => (Some(&symbol[..at]), &symbol[at + 2..]),
        None => (None, symbol),
    }
}

/// The last component of a path, accepting both separators.
pub(crate) fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_symbol() {
        assert_eq!(split_symbol("app::ops::divide"), (Some("app::ops"), "divide"));
        assert_eq!(split_symbol("divide"), (None, "divide"));
        assert_eq!(
            split_symbol("<app::Calc as app::Op>::apply"),
            (Some("<app::Calc as app::Op>"), "apply")
        );
    }

    #[test]
    fn test_module_falls_back_to_file_name() {
        let frame = TraceFrame {
            function: "divide".into(),
            module: None,
            filename: "C:\\work\\src\\ops.rs".into(),
            line_number: 3,
        };
        assert_eq!(frame.module_or_file(), "ops.rs");
    }

    #[test]
    fn test_faultscan_frames() {
        let own = [
            "faultscan::hooks::trace::capture",
            "<faultscan::guard::adapter::Blocking<F> as faultscan::guard::adapter::Invoke<A>>::invoke",
            "<faultscan_backtrace::BacktraceCollector as faultscan::hooks::trace::TraceCollector>::collect",
            "faultscan_backtrace::Backtrace::capture",
            "<std::io::error::Error as faultscan::into_fault::IntoFault>::into_fault_unlocated",
        ];
        for symbol in own {
            assert!(TraceFrame::from_symbol(symbol, "src/lib.rs", 1).is_faultscan_frame(), "{symbol}");
        }

        let user = [
            "app::ops::divide",
            "faultscanner::run",
            "app::run::{{closure}}",
            "core::ops::function::FnOnce::call_once",
            "main",
        ];
        for symbol in user {
            assert!(!TraceFrame::from_symbol(symbol, "src/main.rs", 1).is_faultscan_frame(), "{symbol}");
        }
    }

    #[test]
    fn test_display() {
        let mut trace = Trace::new(vec![TraceFrame::from_symbol("app::divide", "src/ops.rs", 7)]);
        trace.omitted_frames = 2;
        assert_eq!(
            trace.to_string(),
            "   at divide (src/ops.rs:7)\n   ... 2 frame(s) omitted\n"
        );
    }
}
