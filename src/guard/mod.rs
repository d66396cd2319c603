//! Guarded calls.
//!
//! A [`Guarded`] wraps a target built with one of the [`adapter`]s. Calling
//! it runs the target and, if the target fails, classifies the fault against
//! the guard's [`Options`]:
//!
//! - ignored faults return [`Outcome::Ignored`] with the kind name,
//! - propagated faults are returned as `Err`, and propagated panics resume
//!   unwinding,
//! - every other fault is reported to the scanner's sink and returns
//!   [`Outcome::Captured`] with the kind name.
//!
//! ```rust
//! use faultscan::{Fault, Kwargs, Options, Outcome, Scanner, guard::adapter, kind::kinds};
//!
//! let scanner = Scanner::new();
//! let divide = scanner
//!     .guard(Options::new().propagate(&kinds::VALUE_ERROR))
//!     .wrap(adapter::blocking(|(a, b): (i32, i32)| {
//!         a.checked_div(b)
//!             .ok_or_else(|| Fault::new(&kinds::ZERO_DIVISION_ERROR, "division by zero"))
//!     }));
//!
//! assert_eq!(divide.call((10, 2), Kwargs::new()).unwrap(), Outcome::Completed(5));
//! assert_eq!(
//!     divide.call((10, 0), Kwargs::new()).unwrap(),
//!     Outcome::Captured("ZeroDivisionError")
//! );
//! ```

pub mod adapter;
pub mod metadata;

use core::{future::Future, panic::Location, pin::pin};
use std::panic::{self, AssertUnwindSafe};

use futures::FutureExt;
use triomphe::Arc;

use crate::{
    args::Arguments,
    capture::CaptureRequest,
    classify::{Disposition, classify},
    dispatch::Scanner,
    fault::Fault,
    guard::{
        adapter::{Invoke, InvokeAsync, Target},
        metadata::FunctionMetadata,
    },
    hooks::panic::{GuardScope, clear_last_panic},
    options::Options,
    redact,
    value::Kwargs,
};

/// Keyword arguments that describe the call to the report rather than to the
/// target. They are removed before the target runs unless it declares a
/// parameter with the same name.
pub const RESERVED_KEYS: [&str; 8] = [
    "target_type",
    "target_user_id",
    "target_group_id",
    "event",
    "error_context",
    "custom_context",
    "ignore_errors",
    "propagate_errors",
];

/// The result of a guarded call that did not propagate a fault.
#[must_use]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The target returned a value.
    Completed(T),
    /// The target failed with an ignored fault of the named kind.
    Ignored(&'static str),
    /// The target failed and the fault of the named kind was reported.
    Captured(&'static str),
}

impl<T> Outcome<T> {
    /// The returned value, if the target completed.
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Ignored(_) | Outcome::Captured(_) => None,
        }
    }

    /// The kind name of the fault, if the target failed.
    pub fn kind_name(&self) -> Option<&'static str> {
        match self {
            Outcome::Completed(_) => None,
            Outcome::Ignored(kind) | Outcome::Captured(kind) => Some(*kind),
        }
    }

    /// Returns `true` if the target completed.
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    /// Maps the returned value.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Completed(value) => Outcome::Completed(f(value)),
            Outcome::Ignored(kind) => Outcome::Ignored(kind),
            Outcome::Captured(kind) => Outcome::Captured(kind),
        }
    }

    /// The returned value, or the kind name of the fault.
    pub fn into_result(self) -> Result<T, &'static str> {
        match self {
            Outcome::Completed(value) => Ok(value),
            Outcome::Ignored(kind) | Outcome::Captured(kind) => Err(kind),
        }
    }
}

impl<T> Outcome<Outcome<T>> {
    /// Collapses the outcome of a nested guard.
    pub fn flatten(self) -> Outcome<T> {
        match self {
            Outcome::Completed(inner) => inner,
            Outcome::Ignored(kind) => Outcome::Ignored(kind),
            Outcome::Captured(kind) => Outcome::Captured(kind),
        }
    }
}

/// Builds a [`Guarded`]. Created by [`Scanner::guard`].
#[must_use]
#[derive(Debug)]
pub struct GuardBuilder {
    scanner: Scanner,
    options: Options,
    metadata: Option<FunctionMetadata>,
}

impl GuardBuilder {
    pub(crate) fn new(scanner: Scanner, options: Options) -> Self {
        Self {
            scanner,
            options,
            metadata: None,
        }
    }

    /// Describes the target explicitly instead of deriving its metadata.
    pub fn describe(mut self, metadata: FunctionMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Wraps `target`.
    ///
    /// Without [`describe`](Self::describe), the target is named after its
    /// type and located at the caller. A target that is itself guarded keeps
    /// its metadata.
    #[track_caller]
    pub fn wrap<C: Target>(self, target: C) -> Guarded<C> {
        let metadata = match (self.metadata, target.target_metadata()) {
            (Some(metadata), _) => Arc::new(metadata),
            (None, Some(inner)) => Arc::clone(inner),
            (None, None) => Arc::new(FunctionMetadata::for_type_name(
                target.target_name(),
                Location::caller(),
            )),
        };
        Guarded {
            target,
            scanner: self.scanner,
            options: Arc::new(self.options),
            metadata,
        }
    }
}

/// A target whose faults are classified and reported.
///
/// See the [module documentation](self).
#[derive(Debug)]
pub struct Guarded<C> {
    target: C,
    scanner: Scanner,
    options: Arc<Options>,
    metadata: Arc<FunctionMetadata>,
}

impl<C: Clone> Clone for Guarded<C> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            scanner: self.scanner.clone(),
            options: Arc::clone(&self.options),
            metadata: Arc::clone(&self.metadata),
        }
    }
}

impl<C> Guarded<C> {
    /// Metadata of the guarded function.
    pub fn metadata(&self) -> &FunctionMetadata {
        &self.metadata
    }

    /// The options this guard was built with.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The wrapped target.
    pub fn target(&self) -> &C {
        &self.target
    }

    /// Calls a blocking target.
    ///
    /// A propagated panic resumes unwinding here with its original payload.
    #[track_caller]
    pub fn call<A>(&self, args: A, kwargs: Kwargs) -> Result<Outcome<C::Output>, Fault>
    where
        C: Invoke<A>,
        A: Arguments,
    {
        resume_propagated_panic(self.execute(args, kwargs, Some(Location::caller())))
    }

    /// Calls a suspending target.
    ///
    /// A propagated panic resumes unwinding when the returned future is
    /// polled to completion.
    #[track_caller]
    pub fn call_async<'a, A>(
        &'a self,
        args: A,
        kwargs: Kwargs,
    ) -> impl Future<Output = Result<Outcome<C::Output>, Fault>> + Send + 'a
    where
        C: InvokeAsync<A> + Sync,
        A: Arguments + Send + 'a,
    {
        let caller = Location::caller();
        async move { resume_propagated_panic(self.execute_async(args, kwargs, Some(caller)).await) }
    }

    fn filter(&self, mut kwargs: Kwargs) -> Kwargs {
        kwargs.retain(|key| self.metadata.declares(key) || !RESERVED_KEYS.contains(&key));
        kwargs
    }

    fn execute<A>(
        &self,
        args: A,
        kwargs: Kwargs,
        caller: Option<&'static Location<'static>>,
    ) -> Result<Outcome<C::Output>, Fault>
    where
        C: Invoke<A>,
        A: Arguments,
    {
        let summaries = args.summarize(redact::ARGS_LIMIT);
        let reported = kwargs.clone();
        let kwargs = self.filter(kwargs);

        let result = if self.options.catch_panics {
            clear_last_panic();
            let caught = {
                let _scope = GuardScope::enter();
                panic::catch_unwind(AssertUnwindSafe(|| self.target.invoke(args, kwargs)))
            };
            caught.unwrap_or_else(|payload| Err(Fault::from_panic(payload, caller)))
        } else {
            self.target.invoke(args, kwargs)
        };

        match result {
            Ok(value) => Ok(Outcome::Completed(value)),
            Err(fault) => self.handle(fault, &summaries, &reported, caller),
        }
    }

    async fn execute_async<A>(
        &self,
        args: A,
        kwargs: Kwargs,
        caller: Option<&'static Location<'static>>,
    ) -> Result<Outcome<C::Output>, Fault>
    where
        C: InvokeAsync<A>,
        A: Arguments,
    {
        let summaries = args.summarize(redact::ARGS_LIMIT);
        let reported = kwargs.clone();
        let kwargs = self.filter(kwargs);

        let result = if self.options.catch_panics {
            clear_last_panic();
            let started = {
                let _scope = GuardScope::enter();
                panic::catch_unwind(AssertUnwindSafe(|| self.target.invoke_async(args, kwargs)))
            };
            match started {
                Ok(future) => {
                    let mut future = pin!(future);
                    let scoped = core::future::poll_fn(|cx| {
                        let _scope = GuardScope::enter();
                        future.as_mut().poll(cx)
                    });
                    AssertUnwindSafe(scoped)
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|payload| Err(Fault::from_panic(payload, caller)))
                }
                Err(payload) => Err(Fault::from_panic(payload, caller)),
            }
        } else {
            self.target.invoke_async(args, kwargs).await
        };

        match result {
            Ok(value) => Ok(Outcome::Completed(value)),
            Err(fault) => self.handle(fault, &summaries, &reported, caller),
        }
    }

    fn handle<T>(
        &self,
        mut fault: Fault,
        args: &[String],
        kwargs: &Kwargs,
        caller: Option<&'static Location<'static>>,
    ) -> Result<Outcome<T>, Fault> {
        if let Some(caller) = caller {
            fault.locate_if_unknown(caller);
        }
        let kind = fault.kind();

        match classify(kind, &self.options) {
            Disposition::Ignore => {
                tracing::debug!(
                    kind = kind.name(),
                    function = %self.metadata.name,
                    "ignoring fault"
                );
                Ok(Outcome::Ignored(kind.name()))
            }
            Disposition::Propagate => {
                tracing::debug!(
                    kind = kind.name(),
                    function = %self.metadata.name,
                    "propagating fault"
                );
                fault.attribute(Arc::clone(&self.metadata));
                Err(fault)
            }
            Disposition::Capture => {
                self.scanner.capture(&CaptureRequest {
                    fault: &fault,
                    options: &self.options,
                    args,
                    kwargs,
                    caller,
                    metadata: Some(&self.metadata),
                });
                Ok(Outcome::Captured(kind.name()))
            }
        }
    }
}

fn resume_propagated_panic<T>(result: Result<T, Fault>) -> Result<T, Fault> {
    match result {
        Err(mut fault) if fault.is_panic() => match fault.take_panic_payload() {
            Some(payload) => panic::resume_unwind(payload),
            None => Err(fault),
        },
        other => other,
    }
}

impl<C: Target> Target for Guarded<C> {
    fn target_name(&self) -> &'static str {
        self.target.target_name()
    }

    fn target_metadata(&self) -> Option<&Arc<FunctionMetadata>> {
        Some(&self.metadata)
    }
}

/// A guard inside another guard. Faults the inner guard propagates reach the
/// outer one, attributed to the inner function.
impl<C, A> Invoke<A> for Guarded<C>
where
    C: Invoke<A>,
    A: Arguments,
{
    type Output = Outcome<C::Output>;

    fn invoke(&self, args: A, kwargs: Kwargs) -> Result<Self::Output, Fault> {
        self.execute(args, kwargs, None)
    }
}

impl<C, A> InvokeAsync<A> for Guarded<C>
where
    C: InvokeAsync<A> + Sync,
    A: Arguments + Send,
{
    type Output = Outcome<C::Output>;

    fn invoke_async(
        &self,
        args: A,
        kwargs: Kwargs,
    ) -> impl Future<Output = Result<Self::Output, Fault>> + Send {
        self.execute_async(args, kwargs, None)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        dispatch::Handler,
        kind::kinds,
        report::ErrorReport,
    };

    fn recording_scanner() -> (Scanner, std::sync::Arc<Mutex<Vec<ErrorReport>>>) {
        let reports = std::sync::Arc::new(Mutex::new(Vec::new()));
        let scanner = Scanner::new();
        let sink = std::sync::Arc::clone(&reports);
        scanner.set_handler(Some(Handler::blocking(move |report: ErrorReport| {
            sink.lock().unwrap().push(report);
        })));
        (scanner, reports)
    }

    fn divide((a, b): (i32, i32)) -> Result<i32, Fault> {
        a.checked_div(b)
            .ok_or_else(|| Fault::new(&kinds::ZERO_DIVISION_ERROR, "division by zero"))
    }

    #[test]
    fn test_reserved_keys_are_filtered() {
        let scanner = Scanner::new();
        let echo = scanner.wrap(adapter::blocking_with_context(|(): (), kwargs: Kwargs| {
            Ok::<_, Fault>(kwargs.keys().cloned().collect::<Vec<_>>())
        }));
        let kwargs = Kwargs::new()
            .with("event", "signup")
            .with("target_type", "group")
            .with("user", "ada");
        let keys = echo.call((), kwargs).unwrap().completed().unwrap();
        assert_eq!(keys, ["user"]);
    }

    #[test]
    fn test_declared_reserved_key_is_kept() {
        let scanner = Scanner::new();
        let echo = scanner
            .guard(Options::new())
            .describe(FunctionMetadata::named("app::on_event").parameters(["event"]))
            .wrap(adapter::blocking_with_context(|(): (), kwargs: Kwargs| {
                Ok::<_, Fault>(kwargs.len())
            }));
        let kwargs = Kwargs::new().with("event", "signup").with("custom_context", "x");
        assert_eq!(echo.call((), kwargs).unwrap(), Outcome::Completed(1));
    }

    #[test]
    fn test_capture_reports_and_returns_kind() {
        let (scanner, reports) = recording_scanner();
        let guarded = scanner.wrap(adapter::blocking(divide));
        assert_eq!(
            guarded.call((1, 0), Kwargs::new()).unwrap(),
            Outcome::Captured("ZeroDivisionError")
        );
        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].extra("arg_1"), Some("0"));
        assert_eq!(reports[0].extra("decorated_function_name"), Some("divide"));
    }

    #[test]
    fn test_ignore_and_propagate() {
        let (scanner, reports) = recording_scanner();
        let ignoring = scanner
            .guard(Options::new().ignore(&kinds::ARITHMETIC_ERROR))
            .wrap(adapter::blocking(divide));
        assert_eq!(
            ignoring.call((1, 0), Kwargs::new()).unwrap(),
            Outcome::Ignored("ZeroDivisionError")
        );

        let propagating = scanner
            .guard(Options::new().propagate(&kinds::ZERO_DIVISION_ERROR))
            .wrap(adapter::blocking(divide));
        let fault = propagating.call((1, 0), Kwargs::new()).unwrap_err();
        assert_eq!(fault.message(), "division by zero");
        assert_eq!(fault.attributions().len(), 1);
        assert!(reports.lock().unwrap().is_empty());
    }

    #[test]
    fn test_panic_is_captured() {
        let (scanner, reports) = recording_scanner();
        let guarded = scanner.wrap(adapter::blocking(|(a, b): (i32, i32)| Ok::<_, Fault>(a / b)));
        let outcome = guarded.call((1, core::hint::black_box(0)), Kwargs::new()).unwrap();
        assert_eq!(outcome, Outcome::Captured("ZeroDivisionError"));
        assert_eq!(reports.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_propagated_panic_resumes() {
        let scanner = Scanner::new();
        let guarded = scanner
            .guard(Options::new().propagate(&kinds::PANIC))
            .wrap(adapter::blocking(|(): ()| -> Result<(), Fault> { panic!("boom") }));
        let payload = panic::catch_unwind(AssertUnwindSafe(|| guarded.call((), Kwargs::new())))
            .unwrap_err();
        assert_eq!(payload.downcast_ref::<&str>(), Some(&"boom"));
    }

    #[test]
    fn test_nested_guard_keeps_metadata() {
        let scanner = Scanner::new();
        let inner = scanner
            .guard(Options::new().propagate(&kinds::ERROR))
            .wrap(adapter::blocking(divide));
        let outer = scanner.wrap(inner);
        assert_eq!(outer.metadata().name, "divide");
        assert_eq!(
            outer.call((6, 3), Kwargs::new()).unwrap().flatten(),
            Outcome::Completed(2)
        );
    }

    #[test]
    fn test_outcome_helpers() {
        let outcome: Outcome<i32> = Outcome::Captured("KeyError");
        assert_eq!(outcome.kind_name(), Some("KeyError"));
        assert_eq!(outcome.clone().into_result(), Err("KeyError"));
        assert!(!outcome.is_completed());
        assert_eq!(Outcome::Completed(2).map(|x| x * 2).completed(), Some(4));
    }

    #[tokio::test]
    async fn test_async_completed() {
        let (scanner, reports) = recording_scanner();
        let guarded = scanner.wrap(adapter::suspending(|(a, b): (i32, i32)| async move {
            tokio::task::yield_now().await;
            divide((a, b))
        }));
        let outcome = guarded.call_async((9, 3), Kwargs::new()).await.unwrap();
        assert_eq!(outcome, Outcome::Completed(3));
        assert!(reports.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_async_ignore_and_propagate() {
        let (scanner, reports) = recording_scanner();
        let target = |(a, b): (i32, i32)| async move { divide((a, b)) };

        let ignoring = scanner
            .guard(Options::new().ignore(&kinds::ZERO_DIVISION_ERROR))
            .wrap(adapter::suspending(target));
        assert_eq!(
            ignoring.call_async((1, 0), Kwargs::new()).await.unwrap(),
            Outcome::Ignored("ZeroDivisionError")
        );

        let propagating = scanner
            .guard(Options::new().propagate(&kinds::ARITHMETIC_ERROR))
            .wrap(adapter::suspending(target));
        let fault = propagating.call_async((1, 0), Kwargs::new()).await.unwrap_err();
        assert_eq!(fault.kind().name(), "ZeroDivisionError");
        assert_eq!(fault.attributions().len(), 1);
        assert!(reports.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_async_capture_reaches_suspending_sink_once() {
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        let scanner = Scanner::new();
        scanner.set_handler(Some(Handler::suspending(move |report: ErrorReport| {
            let sender = sender.clone();
            async move { sender.send(report) }
        })));
        let guarded = scanner.wrap(adapter::suspending(|(a, b): (i32, i32)| async move {
            divide((a, b))
        }));

        let outcome = guarded.call_async((4, 0), Kwargs::new()).await.unwrap();
        assert_eq!(outcome, Outcome::Captured("ZeroDivisionError"));

        let report = receiver.recv().await.unwrap();
        assert_eq!(report.extra("arg_0"), Some("4"));
        assert_eq!(report.extra("decorated_function_name"), Some(&*guarded.metadata().name));
        drop(scanner);
        drop(guarded);
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_async_capture() {
        let (scanner, reports) = recording_scanner();
        let guarded = scanner.wrap(adapter::suspending(|(key,): (&'static str,)| async move {
            Err::<(), _>(Fault::new(&kinds::KEY_ERROR, key))
        }));
        let outcome = guarded.call_async(("missing",), Kwargs::new()).await.unwrap();
        assert_eq!(outcome, Outcome::Captured("KeyError"));
        assert_eq!(reports.lock().unwrap()[0].error.message, "missing");
    }
}
