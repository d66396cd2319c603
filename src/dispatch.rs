//! Report sinks and the [`Scanner`] that delivers reports to them.
//!
//! A scanner holds at most one [`Handler`]. Guards built from a scanner
//! report through it, and [`Scanner::report_error`] reports a fault without a
//! guard. Without a handler, nothing is built or delivered.
//!
//! Sinks never affect the call that failed: a sink that returns an error or
//! panics is logged with `tracing` and otherwise ignored.
//!
//! ```rust
//! use faultscan::{Handler, Options, Scanner, kind::kinds, report::ErrorReport};
//!
//! let scanner = Scanner::new();
//! scanner.set_handler(Some(Handler::blocking(|report: ErrorReport| {
//!     eprintln!("{}: {}", report.kind(), report.error.message);
//! })));
//!
//! scanner.report_error(&kinds::VALUE_ERROR, "quota exceeded", &Options::default());
//! ```

use core::{fmt, future::Future, panic::Location};
use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, OnceLock, PoisonError, RwLock},
};

use futures::{
    FutureExt, StreamExt,
    channel::mpsc::{self, UnboundedSender},
    future::BoxFuture,
};

use crate::{
    capture::{
        CaptureRequest, build_report,
        stack::{StackWalker, TraceWalker},
    },
    fault::Fault,
    guard::{GuardBuilder, Guarded, adapter::Target},
    kind::FaultKind,
    options::Options,
    report::ErrorReport,
    value::Kwargs,
};

/// Why a sink did not accept a report.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The sink returned an error.
    #[error("report sink failed: {0}")]
    Failed(String),
    /// The sink panicked.
    #[error("report sink panicked: {0}")]
    Panicked(String),
}

/// The result type a blocking sink closure may return.
pub trait SinkResult {
    /// Converts into the result of [`ReportSink::handle`].
    fn into_sink_result(self) -> Result<(), SinkError>;
}

impl SinkResult for () {
    fn into_sink_result(self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<E: fmt::Display> SinkResult for Result<(), E> {
    fn into_sink_result(self) -> Result<(), SinkError> {
        self.map_err(|error| SinkError::Failed(error.to_string()))
    }
}

/// Receives reports on the thread that caught the fault.
///
/// Closures taking an [`ErrorReport`] and returning `()` or
/// `Result<(), E: Display>` are sinks.
pub trait ReportSink: 'static + Send + Sync {
    /// Handles one report.
    fn handle(&self, report: ErrorReport) -> Result<(), SinkError>;
}

impl<F, R> ReportSink for F
where
    F: 'static + Send + Sync + Fn(ErrorReport) -> R,
    R: SinkResult,
{
    fn handle(&self, report: ErrorReport) -> Result<(), SinkError> {
        self(report).into_sink_result()
    }
}

/// Receives reports as detached work.
///
/// Closures taking an [`ErrorReport`] and returning a `Send` future of
/// `()` or `Result<(), E: Display>` are sinks.
pub trait AsyncReportSink: 'static + Send + Sync {
    /// Handles one report.
    fn handle(&self, report: ErrorReport) -> BoxFuture<'static, Result<(), SinkError>>;
}

impl<F, Fut> AsyncReportSink for F
where
    F: 'static + Send + Sync + Fn(ErrorReport) -> Fut,
    Fut: 'static + Send + Future,
    Fut::Output: SinkResult,
{
    fn handle(&self, report: ErrorReport) -> BoxFuture<'static, Result<(), SinkError>> {
        self(report).map(SinkResult::into_sink_result).boxed()
    }
}

/// The sink a scanner delivers to.
#[derive(Clone)]
pub enum Handler {
    /// Runs inline, before the guarded call returns.
    Blocking(Arc<dyn ReportSink>),
    /// Runs detached, on the current tokio runtime if there is one and on a
    /// shared sink thread otherwise. Delivery is best effort and unordered.
    Suspending(Arc<dyn AsyncReportSink>),
}

impl Handler {
    /// A blocking handler.
    pub fn blocking(sink: impl ReportSink) -> Self {
        Handler::Blocking(Arc::new(sink))
    }

    /// A suspending handler.
    pub fn suspending(sink: impl AsyncReportSink) -> Self {
        Handler::Suspending(Arc::new(sink))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Blocking(_) => f.write_str("Handler::Blocking"),
            Handler::Suspending(_) => f.write_str("Handler::Suspending"),
        }
    }
}

struct Inner {
    handler: RwLock<Option<Handler>>,
    walker: Arc<dyn StackWalker>,
}

/// Builds guards and delivers their reports.
///
/// Cloning a scanner is cheap; clones share the handler.
#[derive(Clone)]
pub struct Scanner {
    inner: Arc<Inner>,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::with_walker(TraceWalker)
    }
}

impl fmt::Debug for Scanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("handler", &*self.read_handler())
            .finish_non_exhaustive()
    }
}

impl Scanner {
    /// Creates a scanner without a handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scanner that reads report frames from `walker`.
    pub fn with_walker(walker: impl StackWalker) -> Self {
        Self {
            inner: Arc::new(Inner {
                handler: RwLock::new(None),
                walker: Arc::new(walker),
            }),
        }
    }

    /// A process-wide scanner, created on first use.
    pub fn global() -> &'static Scanner {
        static GLOBAL: OnceLock<Scanner> = OnceLock::new();
        GLOBAL.get_or_init(Scanner::new)
    }

    /// Replaces the handler, returning the previous one.
    pub fn set_handler(&self, handler: Option<Handler>) -> Option<Handler> {
        let mut slot = self
            .inner
            .handler
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        core::mem::replace(&mut *slot, handler)
    }

    /// Removes the handler, returning it.
    pub fn clear_handler(&self) -> Option<Handler> {
        self.set_handler(None)
    }

    /// Returns `true` if a handler is set.
    pub fn has_handler(&self) -> bool {
        self.read_handler().is_some()
    }

    /// Wraps `target` with default options.
    #[track_caller]
    pub fn wrap<C: Target>(&self, target: C) -> Guarded<C> {
        self.guard(Options::default()).wrap(target)
    }

    /// Starts building a guard with `options`.
    pub fn guard(&self, options: Options) -> GuardBuilder {
        GuardBuilder::new(self.clone(), options)
    }

    /// Reports a fault of `kind` thrown at the caller, as if a guarded call
    /// had captured it.
    ///
    /// The entries of `options.context` stand in for keyword arguments.
    #[track_caller]
    pub fn report_error(&self, kind: &'static FaultKind, reason: impl Into<String>, options: &Options) {
        let caller = Location::caller();
        let fault = Fault::new(kind, reason);
        self.capture(&CaptureRequest {
            fault: &fault,
            options,
            args: &[],
            kwargs: &Kwargs::new(),
            caller: Some(caller),
            metadata: None,
        });
    }

    /// Delivers `report` to the handler, if any.
    pub fn dispatch(&self, report: ErrorReport) {
        let Some(handler) = self.read_handler().clone() else {
            return;
        };

        match handler {
            Handler::Blocking(sink) => {
                match panic::catch_unwind(AssertUnwindSafe(|| sink.handle(report))) {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => tracing::warn!(%error, "report sink failed"),
                    Err(payload) => {
                        let error = SinkError::Panicked(panic_message(&*payload));
                        tracing::warn!(%error, "report sink panicked");
                    }
                }
            }
            Handler::Suspending(sink) => {
                match panic::catch_unwind(AssertUnwindSafe(|| sink.handle(report))) {
                    Ok(future) => spawn_detached(future),
                    Err(payload) => {
                        let error = SinkError::Panicked(panic_message(&*payload));
                        tracing::warn!(%error, "report sink panicked");
                    }
                }
            }
        }
    }

    pub(crate) fn capture(&self, request: &CaptureRequest<'_>) {
        if !self.has_handler() {
            return;
        }
        let built = panic::catch_unwind(AssertUnwindSafe(|| {
            build_report(request, &*self.inner.walker)
        }));
        match built {
            Ok(report) => self.dispatch(report),
            Err(payload) => tracing::error!(
                kind = request.fault.kind().name(),
                panic = %panic_message(&*payload),
                "failed to build error report"
            ),
        }
    }

    fn read_handler(&self) -> std::sync::RwLockReadGuard<'_, Option<Handler>> {
        self.inner
            .handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn spawn_detached(future: BoxFuture<'static, Result<(), SinkError>>) {
    let task = async move {
        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => tracing::warn!(%error, "report sink failed"),
            Err(payload) => {
                let error = SinkError::Panicked(panic_message(&*payload));
                tracing::warn!(%error, "report sink panicked");
            }
        }
    };

    if let Ok(runtime) = tokio::runtime::Handle::try_current() {
        drop(runtime.spawn(task));
        return;
    }
    let Some(worker) = sink_worker() else {
        return;
    };
    if worker.unbounded_send(task.boxed()).is_err() {
        tracing::warn!("report sink thread has stopped");
    }
}

/// The thread that runs suspending sinks outside a tokio runtime, started on
/// first use. Its sinks run concurrently with each other.
fn sink_worker() -> Option<&'static UnboundedSender<BoxFuture<'static, ()>>> {
    static WORKER: OnceLock<Option<UnboundedSender<BoxFuture<'static, ()>>>> = OnceLock::new();
    WORKER
        .get_or_init(|| {
            let (sender, receiver) = mpsc::unbounded::<BoxFuture<'static, ()>>();
            let spawned = std::thread::Builder::new()
                .name("faultscan-sink".into())
                .spawn(move || {
                    futures::executor::block_on(receiver.for_each_concurrent(None, |task| task));
                });
            match spawned {
                Ok(_) => Some(sender),
                Err(error) => {
                    tracing::warn!(%error, "failed to start report sink thread");
                    None
                }
            }
        })
        .as_ref()
}

fn panic_message(payload: &(dyn core::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&'static str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("Box<dyn Any>"))
}
