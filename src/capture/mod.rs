//! Collecting everything a report needs from a caught fault.

pub mod chain;
pub mod context;
pub mod source;
pub mod stack;

use core::panic::Location;

use chrono::Local;
use indexmap::IndexMap;

use crate::{
    fault::Fault,
    guard::metadata::FunctionMetadata,
    options::Options,
    report::{
        self, ErrorReport, FrameRecord,
        assemble::{ReportParts, assemble},
    },
    value::Kwargs,
};
use chain::{RawTrace, walk_chain};
use source::SourceCache;
use stack::StackWalker;

/// One fault to report, with the call it came from.
pub(crate) struct CaptureRequest<'a> {
    pub(crate) fault: &'a Fault,
    pub(crate) options: &'a Options,
    pub(crate) args: &'a [String],
    pub(crate) kwargs: &'a Kwargs,
    pub(crate) caller: Option<&'static Location<'static>>,
    pub(crate) metadata: Option<&'a FunctionMetadata>,
}

/// Builds the report for `request`, reading frames from `walker`.
pub(crate) fn build_report(request: &CaptureRequest<'_>, walker: &dyn StackWalker) -> ErrorReport {
    let CaptureRequest { fault, options, .. } = *request;
    let mut sources = SourceCache::new();

    let frames = walker.walk(fault, options.max_stack_depth.max(1));

    let location = frames.first().map(|frame| report::Location {
        filename: frame.filename.clone(),
        line_number: frame.line_number,
        function_name: frame.function_name.clone(),
        source_line: sources
            .line(&frame.filename, frame.line_number)
            .unwrap_or_default(),
        module: frame.module.clone(),
    });

    let code_context = location
        .as_ref()
        .filter(|_| options.capture_code_context)
        .map(|location| {
            sources.code_window(
                &location.filename,
                location.line_number,
                Some(location.source_line.as_str()),
            )
        });

    let mut local_variables = (options.capture_locals
        && options.capture_code_context
        && !fault.locals().is_empty())
    .then(|| {
        fault
            .locals()
            .iter()
            .map(|local| {
                let value = options.redaction.apply(&local.name, &local.value);
                (local.name.clone(), value)
            })
            .collect::<IndexMap<_, _>>()
    });

    let mut stack_trace = Vec::with_capacity(frames.len().min(options.max_stack_depth));
    for frame in frames.into_iter().take(options.max_stack_depth) {
        let source_context = if options.capture_code_context {
            sources.frame_window(&frame.filename, frame.line_number)
        } else {
            None
        };
        stack_trace.push(FrameRecord {
            code: sources.line(&frame.filename, frame.line_number),
            local_variables: local_variables.take(),
            source_context,
            filename: frame.filename,
            line_number: frame.line_number,
            function_name: frame.function_name,
            module: frame.module,
        });
    }

    let mut kwargs = request.kwargs.clone();
    kwargs.extend(
        options
            .context
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );
    let caller_function = request.caller.and_then(|_| walker.caller_function());
    let mut extra = context::extract(
        request.args,
        &kwargs,
        &options.redaction,
        request.caller,
        caller_function.as_deref(),
    );
    extra.extend(
        options
            .custom_context
            .iter()
            .map(|(key, value)| (key.clone(), value.clone())),
    );
    if let Some(metadata) = request.metadata {
        extra.extend(metadata.report_entries("decorated_function"));
    }
    for (layer, inner) in fault.attributions().iter().rev().enumerate() {
        extra.extend(inner.report_entries(&format!("wrapped_function_{}", layer + 1)));
    }

    assemble(ReportParts {
        kind: fault.kind().name().to_string(),
        message: fault.message().to_string(),
        level: options.error_level,
        timestamp: Local::now(),
        chain: walk_chain(fault),
        location,
        code_context,
        stack_trace,
        raw_trace: RawTrace(fault).to_string(),
        configuration: options.snapshot(),
        extra,
    })
}
