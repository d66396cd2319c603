//! Stack walking.
//!
//! Reports get their frames from a [`StackWalker`]. The default
//! [`TraceWalker`] reads the [`Trace`](crate::trace::Trace) captured when the
//! fault was created, leaving out this crate's own frames. Without one it
//! falls back to the throw site, and without that it returns no frames at all.

use crate::{
    fault::Fault,
    hooks,
    trace::{Trace, TraceFrame, file_name, split_symbol},
};

/// A frame produced by a [`StackWalker`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalkedFrame {
    /// The source file.
    pub filename: String,
    /// The executing line.
    pub line_number: u32,
    /// The function name without its module path.
    pub function_name: String,
    /// The module path, or the file name when unknown.
    pub module: String,
}

impl From<&TraceFrame> for WalkedFrame {
    fn from(frame: &TraceFrame) -> Self {
        Self {
            filename: frame.filename.clone(),
            line_number: frame.line_number,
            function_name: frame.function.clone(),
            module: frame.module_or_file().to_string(),
        }
    }
}

/// Produces the frames of a fault, innermost first.
///
/// Walkers must not fail: when nothing is known they return fewer frames.
pub trait StackWalker: 'static + Send + Sync {
    /// Returns at most `max_depth` frames for `fault`.
    fn walk(&self, fault: &Fault, max_depth: usize) -> Vec<WalkedFrame>;

    /// The name of the function that called into this crate, read from the
    /// live stack of the calling thread.
    ///
    /// The default asks the installed
    /// [`TraceCollector`](crate::hooks::trace::TraceCollector) and returns
    /// `None` without one.
    fn caller_function(&self) -> Option<String> {
        caller_in(&hooks::trace::capture()?)
    }
}

/// The first frame of `trace` outside this crate and the standard library,
/// named after its enclosing function when it is a closure.
pub fn caller_in(trace: &Trace) -> Option<String> {
    trace
        .frames
        .iter()
        .find(|frame| !frame.is_faultscan_frame() && !is_std_frame(frame))
        .map(|frame| enclosing_function(frame).to_string())
}

fn is_std_frame(frame: &TraceFrame) -> bool {
    let Some(module) = &frame.module else {
        return false;
    };
    let self_type = module.trim_start_matches('<');
    ["std", "core", "alloc"].iter().any(|name| {
        self_type
            .strip_prefix(name)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

fn enclosing_function(frame: &TraceFrame) -> &str {
    let mut function = frame.function.as_str();
    let mut module = frame.module.as_deref();
    while function.starts_with("{{closure}}")
        && let Some(path) = module
    {
        let (outer, name) = split_symbol(path);
        function = name;
        module = outer;
    }
    function
}

/// The default walker, reading the trace captured with the fault.
#[derive(Copy, Clone, Debug, Default)]
pub struct TraceWalker;

impl StackWalker for TraceWalker {
    fn walk(&self, fault: &Fault, max_depth: usize) -> Vec<WalkedFrame> {
        let traced: Vec<_> = fault
            .trace()
            .into_iter()
            .flat_map(|trace| &trace.frames)
            .filter(|frame| !frame.is_faultscan_frame())
            .take(max_depth)
            .map(WalkedFrame::from)
            .collect();
        if !traced.is_empty() || max_depth == 0 {
            return traced;
        }

        let Some(site) = fault.site() else {
            return Vec::new();
        };
        let (module, function) = match fault.function() {
            Some(path) => split_symbol(path),
            None => (None, "<unknown>"),
        };
        let frame = WalkedFrame {
            filename: site.file.to_string(),
            line_number: site.line,
            function_name: function.to_string(),
            module: module.unwrap_or_else(|| file_name(&site.file)).to_string(),
        };
        core::iter::once(frame).take(max_depth).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::kinds;

    #[test]
    fn test_single_frame_without_trace() {
        let line = line!() + 1;
        let fault = Fault::new(&kinds::ERROR, "plain").in_function("app::ops::divide");
        let frames = TraceWalker.walk(&fault, 10);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].line_number, line);
        assert_eq!(frames[0].function_name, "divide");
        assert_eq!(frames[0].module, "app::ops");
        assert!(TraceWalker.walk(&fault, 0).is_empty());
    }

    #[test]
    fn test_own_frames_are_skipped() {
        let fault = Fault::new(&kinds::ERROR, "inner").with_trace(Trace::new(vec![
            TraceFrame::from_symbol("faultscan_backtrace::Backtrace::capture", "lib.rs", 464),
            TraceFrame::from_symbol("faultscan::hooks::trace::capture", "trace.rs", 90),
            TraceFrame::from_symbol("faultscan::fault::Fault::new", "fault.rs", 80),
            TraceFrame::from_symbol("app::thrower", "src/app.rs", 12),
            TraceFrame::from_symbol(
                "<faultscan::guard::adapter::Blocking<F> as faultscan::guard::adapter::Invoke<A>>::invoke",
                "adapter.rs",
                180,
            ),
            TraceFrame::from_symbol("app::main", "src/main.rs", 3),
        ]));
        let frames = TraceWalker.walk(&fault, 10);
        let names: Vec<_> = frames.iter().map(|frame| frame.function_name.as_str()).collect();
        assert_eq!(names, ["thrower", "main"]);
        assert_eq!(frames[0].line_number, 12);

        let line = line!() + 1;
        let only_own = Fault::new(&kinds::ERROR, "inner").with_trace(Trace::new(vec![
            TraceFrame::from_symbol("faultscan::fault::Fault::new", "fault.rs", 80),
        ]));
        let frames = TraceWalker.walk(&only_own, 10);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].line_number, line);
    }

    #[test]
    fn test_caller_skips_own_and_std_frames() {
        let trace = Trace::new(vec![
            TraceFrame::from_symbol("faultscan::dispatch::Scanner::capture", "dispatch.rs", 290),
            TraceFrame::from_symbol("std::panicking::try::do_call", "panicking.rs", 557),
            TraceFrame::from_symbol(
                "<core::panic::unwind_safe::AssertUnwindSafe<F> as core::ops::function::FnOnce<()>>::call_once",
                "unwind_safe.rs",
                272,
            ),
            TraceFrame::from_symbol("faultscan::guard::Guarded<C>::call", "mod.rs", 231),
            TraceFrame::from_symbol("shop::checkout::{{closure}}::{{closure}}", "src/shop.rs", 40),
            TraceFrame::from_symbol("shop::main", "src/main.rs", 3),
        ]);
        assert_eq!(caller_in(&trace).as_deref(), Some("checkout"));

        let trace = Trace::new(vec![TraceFrame::from_symbol("faultscan::report_error", "dispatch.rs", 1)]);
        assert!(caller_in(&trace).is_none());
    }

    #[test]
    fn test_trace_is_bounded() {
        let frames: Vec<_> = (0..20)
            .map(|n| TraceFrame::from_symbol(&format!("app::f{n}"), "src/app.rs", n))
            .collect();
        let fault = Fault::new(&kinds::ERROR, "deep").with_trace(Trace::new(frames));
        let walked = TraceWalker.walk(&fault, 4);
        assert_eq!(walked.len(), 4);
        assert_eq!(walked[0].function_name, "f0");
        assert_eq!(walked[0].module, "app");
        assert_eq!(walked[3].line_number, 3);
    }
}
