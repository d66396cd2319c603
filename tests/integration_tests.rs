//! End-to-end tests: guarded calls producing reports through a scanner.
//!
//! ## Capture
//! - `test_divide_error_is_reported`: a returned fault becomes a report with
//!   location, arguments and function metadata
//! - `test_divide_panic_is_reported`: a panic is caught and classified by its
//!   message
//! - `test_ignore_and_propagate_from_map`: classification configured by name
//!
//! ## Report contents
//! - `test_cause_chain_of_depth_two`, `test_cause_chain`,
//!   `test_source_chain_of_std_error`: chain walking
//! - `test_redaction`: sensitive keyword arguments and locals
//! - `test_max_stack_depth`: frame truncation
//! - `test_nested_guards`: decorated and wrapped function prefixes
//! - `test_report_serializes_to_nested_json`: the serialized shape
//!
//! ## Delivery
//! - `test_async_target_with_async_sink`
//! - `test_failing_sink_does_not_escape`
//! - `test_report_error`

use std::{
    io,
    sync::{Arc, Mutex},
};

use faultscan::{
    ErrorReport, Fault, Handler, Kwargs, Options, Outcome, Scanner,
    guard::{Guarded, adapter, metadata::FunctionMetadata},
    kind::kinds,
    kwargs, locals,
    redact::FILTERED,
    report::Relation,
    trace::{Trace, TraceFrame},
};
use indexmap::IndexMap;
use serde_json::json;
use static_assertions::assert_impl_all;

assert_impl_all!(Scanner: Send, Sync, Clone);
assert_impl_all!(ErrorReport: Send, Sync, Clone);
assert_impl_all!(Fault: Send, Sync);
assert_impl_all!(Handler: Send, Sync, Clone);
assert_impl_all!(Guarded<adapter::Blocking<fn((i32, i32)) -> Result<i32, Fault>>>: Send, Sync, Clone);

type Reports = Arc<Mutex<Vec<ErrorReport>>>;

fn recording_scanner() -> (Scanner, Reports) {
    let reports = Reports::default();
    let scanner = Scanner::new();
    let sink = Arc::clone(&reports);
    scanner.set_handler(Some(Handler::blocking(move |report: ErrorReport| {
        sink.lock().unwrap().push(report);
    })));
    (scanner, reports)
}

fn single(reports: &Reports) -> ErrorReport {
    let reports = reports.lock().unwrap();
    assert_eq!(reports.len(), 1, "expected exactly one report");
    reports[0].clone()
}

fn divide((a, b): (i32, i32)) -> Result<i32, Fault> {
    if b == 0 {
        return Err(Fault::new(&kinds::ZERO_DIVISION_ERROR, "division by zero"));
    }
    Ok(a / b)
}

#[test]
fn test_divide_error_is_reported() {
    let (scanner, reports) = recording_scanner();
    let guarded = scanner.wrap(adapter::blocking(divide));

    assert_eq!(guarded.call((10, 2), Kwargs::new()).unwrap(), Outcome::Completed(5));
    assert!(reports.lock().unwrap().is_empty());

    let line = line!() + 1;
    let outcome = guarded.call((10, 0), kwargs! { "user" => "ada" }).unwrap();
    assert_eq!(outcome, Outcome::Captured("ZeroDivisionError"));

    let report = single(&reports);
    assert_eq!(report.kind(), "ZeroDivisionError");
    assert_eq!(report.error.message, "division by zero");
    assert_eq!(report.error.exception_chain.len(), 1);
    assert!(report.error.exception_chain[0].is_original);
    assert!(!report.stack_trace.is_empty());

    let location = report.location.as_ref().unwrap();
    assert!(location.filename.ends_with("integration_tests.rs"));
    assert!(location.source_line.contains("ZERO_DIVISION_ERROR"));
    let window = report.code_context.as_ref().unwrap();
    assert!(window.lines.iter().any(|line| line.is_error_line));

    assert_eq!(report.extra("arg_0"), Some("10"));
    assert_eq!(report.extra("arg_1"), Some("0"));
    assert_eq!(report.extra("user"), Some("ada"));
    assert_eq!(report.extra("caller_line_number"), Some(line.to_string().as_str()));
    assert_eq!(report.extra("decorated_function_name"), Some("divide"));
    assert!(report.raw_trace.contains("division by zero"));
}

#[test]
fn test_divide_panic_is_reported() {
    let (scanner, reports) = recording_scanner();
    let guarded = scanner.wrap(adapter::blocking(|(a, b): (i32, i32)| Ok::<_, Fault>(a / b)));

    let outcome = guarded
        .call((1, std::hint::black_box(0)), Kwargs::new())
        .unwrap();
    assert_eq!(outcome, Outcome::Captured("ZeroDivisionError"));

    let report = single(&reports);
    assert!(report.error.message.contains("divide by zero"));
    assert!(report.location.is_some());
}

#[test]
fn test_ignore_and_propagate_from_map() {
    let (scanner, reports) = recording_scanner();
    let map: IndexMap<String, serde_json::Value> = serde_json::from_value(json!({
        "ignoreErrors": ["LookupError"],
        "propagate_errors": ["ZeroDivisionError"],
        "errorLevel": "warning",
    }))
    .unwrap();
    let options = Options::from_map(map).unwrap();

    let lookup = scanner
        .guard(options.clone())
        .wrap(adapter::blocking(|(key,): (&str,)| {
            Err::<(), _>(Fault::new(&kinds::KEY_ERROR, format!("no entry {key}")))
        }));
    assert_eq!(
        lookup.call(("a",), Kwargs::new()).unwrap(),
        Outcome::Ignored("KeyError")
    );

    let guarded = scanner.guard(options).wrap(adapter::blocking(divide));
    let fault = guarded.call((1, 0), Kwargs::new()).unwrap_err();
    assert_eq!(fault.kind().name(), "ZeroDivisionError");
    assert!(reports.lock().unwrap().is_empty());

    let map: IndexMap<String, serde_json::Value> =
        serde_json::from_value(json!({ "ignoreErrors": ["NoSuchError"] })).unwrap();
    assert!(Options::from_map(map).is_err());
}

#[test]
fn test_cause_chain_of_depth_two() {
    let (scanner, reports) = recording_scanner();
    let guarded = scanner.wrap(adapter::blocking(|(): ()| {
        let cause = Fault::new(&kinds::IO_ERROR, "disk full");
        Err::<(), _>(Fault::new(&kinds::RUNTIME_ERROR, "save failed").with_cause(cause))
    }));
    guarded.call((), Kwargs::new()).unwrap();

    let chain = single(&reports).error.exception_chain;
    assert_eq!(chain.len(), 2);
    let relations: Vec<_> = chain.iter().filter_map(|link| link.relation).collect();
    assert_eq!(relations, [Relation::CausedBy]);
    assert_eq!(chain[0].message, "save failed");
    assert_eq!(chain[1].message, "disk full");
}

#[test]
fn test_cause_chain() {
    let (scanner, reports) = recording_scanner();
    let guarded = scanner.wrap(adapter::blocking(|(): ()| {
        let lookup = Fault::new(&kinds::KEY_ERROR, "no account 7");
        let handling = Fault::new(&kinds::VALUE_ERROR, "bad ledger").with_context(lookup);
        Err::<(), _>(Fault::new(&kinds::RUNTIME_ERROR, "charge failed").with_cause(handling))
    }));
    guarded.call((), Kwargs::new()).unwrap();

    let chain = single(&reports).error.exception_chain;
    let names: Vec<_> = chain.iter().map(|link| link.kind.as_str()).collect();
    assert_eq!(names, ["RuntimeError", "ValueError", "KeyError"]);
    assert_eq!(chain[0].relation, Some(Relation::CausedBy));
    assert_eq!(chain[1].relation, Some(Relation::ContextFor));
    assert_eq!(chain[2].relation, None);
    assert!(chain.iter().skip(1).all(|link| !link.is_original));
}

#[derive(Debug, thiserror::Error)]
#[error("failed to load settings")]
struct LoadError(#[source] io::Error);

#[test]
fn test_source_chain_of_std_error() {
    let (scanner, reports) = recording_scanner();
    let guarded = scanner.wrap(adapter::blocking(|(path,): (&str,)| {
        std::fs::read_to_string(path).map_err(LoadError)
    }));
    let outcome = guarded
        .call(("/nonexistent/faultscan/settings.toml",), Kwargs::new())
        .unwrap();
    assert_eq!(outcome, Outcome::Captured("LoadError"));

    let report = single(&reports);
    assert_eq!(report.error.exception_chain.len(), 2);
    assert_eq!(report.error.exception_chain[1].kind, "IoError");
    assert_eq!(
        report.extra("arg_0"),
        Some("\"/nonexistent/faultscan/settings.toml\"")
    );
}

#[test]
fn test_redaction() {
    let (scanner, reports) = recording_scanner();
    let guarded = scanner
        .guard(Options::new().capture_locals(true))
        .wrap(adapter::blocking_with_context(|(): (), kwargs: Kwargs| {
            let api_key = kwargs.get("api_key").map(ToString::to_string);
            let attempts = 3;
            Err::<(), _>(locals!(Fault::new(&kinds::RUNTIME_ERROR, "rejected"); api_key, attempts))
        }));

    let kwargs = kwargs! {
        "api_key" => "sk-live-1234",
        "_internal" => 1,
        "account" => "acme",
    };
    guarded.call((), kwargs).unwrap();

    let report = single(&reports);
    assert_eq!(report.extra("api_key"), Some(FILTERED));
    assert_eq!(report.extra("_internal"), Some(FILTERED));
    assert_eq!(report.extra("account"), Some("acme"));

    let locals = report.stack_trace[0].local_variables.as_ref().unwrap();
    assert_eq!(locals["api_key"], FILTERED);
    assert_eq!(locals["attempts"], "3");
    let json = serde_json::to_string(&report).unwrap();
    assert!(!json.contains("sk-live-1234"));
}

#[test]
fn test_max_stack_depth() {
    let (scanner, reports) = recording_scanner();
    let guarded = scanner
        .guard(Options::new().max_stack_depth(3))
        .wrap(adapter::blocking(|(): ()| {
            let frames = (0..12)
                .map(|depth| {
                    TraceFrame::from_symbol(&format!("app::layer_{depth}"), "src/app.rs", depth + 1)
                })
                .collect();
            Err::<(), _>(Fault::new(&kinds::RUNTIME_ERROR, "deep").with_trace(Trace::new(frames)))
        }));
    guarded.call((), Kwargs::new()).unwrap();

    let report = single(&reports);
    assert_eq!(report.stack_trace.len(), 3);
    assert_eq!(report.stack_trace[0].function_name, "layer_0");
    assert_eq!(report.stack_trace[2].function_name, "layer_2");
    assert_eq!(report.location.unwrap().function_name, "layer_0");
    assert_eq!(report.configuration.max_stack_depth, 3);
}

#[test]
fn test_nested_guards() {
    let (scanner, reports) = recording_scanner();
    let inner = scanner
        .guard(Options::new().propagate(&kinds::ERROR))
        .describe(FunctionMetadata::named("ledger::debit"))
        .wrap(adapter::blocking(divide));
    let middle = scanner
        .guard(Options::new().propagate(&kinds::ERROR))
        .describe(FunctionMetadata::named("ledger::transfer"))
        .wrap(inner);
    let outer = scanner
        .guard(Options::new())
        .describe(FunctionMetadata::named("api::handle_transfer"))
        .wrap(middle);

    let outcome = outer.call((5, 0), Kwargs::new()).unwrap();
    assert_eq!(outcome.flatten().flatten(), Outcome::Captured("ZeroDivisionError"));

    let report = single(&reports);
    assert_eq!(report.extra("decorated_function_name"), Some("handle_transfer"));
    assert_eq!(report.extra("decorated_function_module"), Some("api"));
    assert_eq!(report.extra("wrapped_function_1_name"), Some("transfer"));
    assert_eq!(report.extra("wrapped_function_2_name"), Some("debit"));
    assert_eq!(report.extra("wrapped_function_3_name"), None);
}

#[test]
fn test_report_serializes_to_nested_json() {
    let (scanner, reports) = recording_scanner();
    let guarded = scanner
        .guard(Options::new().custom_context("service", "billing"))
        .wrap(adapter::blocking(divide));
    guarded.call((1, 0), Kwargs::new()).unwrap();

    let value = serde_json::to_value(single(&reports)).unwrap();
    assert_eq!(value["error"]["type"], "ZeroDivisionError");
    assert_eq!(value["error"]["level"], "DEBUG");
    assert!(value["error"]["timestamp"].is_string());
    assert!(value["error"]["exceptionChain"].is_array());
    assert!(value["location"]["lineNumber"].is_u64());
    assert!(value["stackTrace"].is_array());
    assert!(value["rawTrace"].is_string());
    assert_eq!(value["configuration"]["captureCodeContext"], true);
    assert_eq!(value["service"], "billing");

    let round_trip: ErrorReport = serde_json::from_value(value).unwrap();
    assert_eq!(round_trip.extra("service"), Some("billing"));
}

#[tokio::test]
async fn test_async_target_with_async_sink() {
    let (sender, mut receiver) = tokio::sync::mpsc::channel(4);
    let scanner = Scanner::new();
    scanner.set_handler(Some(Handler::suspending(move |report: ErrorReport| {
        let sender = sender.clone();
        async move { sender.send(report).await }
    })));

    let guarded = scanner.wrap(adapter::suspending(|(id,): (u32,)| async move {
        tokio::task::yield_now().await;
        Err::<String, _>(Fault::new(&kinds::KEY_ERROR, format!("no order {id}")))
    }));

    let outcome = guarded.call_async((42,), Kwargs::new()).await.unwrap();
    assert_eq!(outcome, Outcome::Captured("KeyError"));

    let report = receiver.recv().await.unwrap();
    assert_eq!(report.error.message, "no order 42");
    assert_eq!(report.extra("arg_0"), Some("42"));
}

#[test]
fn test_failing_sink_does_not_escape() {
    let scanner = Scanner::new();
    scanner.set_handler(Some(Handler::blocking(|_: ErrorReport| {
        Err::<(), _>("collector unavailable")
    })));
    let guarded = scanner.wrap(adapter::blocking(divide));
    assert_eq!(
        guarded.call((1, 0), Kwargs::new()).unwrap(),
        Outcome::Captured("ZeroDivisionError")
    );

    scanner.set_handler(Some(Handler::blocking(|_: ErrorReport| -> () {
        panic!("sink exploded")
    })));
    assert_eq!(
        guarded.call((1, 0), Kwargs::new()).unwrap(),
        Outcome::Captured("ZeroDivisionError")
    );
}

#[test]
fn test_report_error() {
    let (scanner, reports) = recording_scanner();
    let options = Options::new()
        .context("target_type", "user")
        .context("password", "hunter2");
    scanner.report_error(&kinds::VALUE_ERROR, "quota exceeded", &options);

    let report = single(&reports);
    assert_eq!(report.kind(), "ValueError");
    assert_eq!(report.extra("target_type"), Some("user"));
    assert_eq!(report.extra("password"), Some(FILTERED));
    assert!(report.extra("decorated_function_name").is_none());
}
