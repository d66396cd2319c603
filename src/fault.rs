//! The fault value carried from the point of failure to the report.
//!
//! A [`Fault`] is what a guarded call catches. It is created in one of three
//! ways:
//!
//! - explicitly, with [`Fault::new`] or the [`fault!`](crate::fault!) macro,
//! - by converting any `std::error::Error` with `?` or [`From`],
//! - by a guarded call that catches a panic.
//!
//! Creation records where the fault was thrown and, if a
//! [`TraceCollector`](crate::hooks::trace::TraceCollector) is installed, the
//! stack at that point.
//!
//! ```rust
//! use faultscan::{Fault, kind::kinds};
//!
//! let lookup = Fault::new(&kinds::KEY_ERROR, "no user 'ada'");
//! let fault = Fault::new(&kinds::RUNTIME_ERROR, "cannot load profile")
//!     .with_cause(lookup)
//!     .with_local("user", &"ada");
//!
//! assert_eq!(fault.to_string(), "RuntimeError: cannot load profile");
//! assert_eq!(fault.cause().unwrap().kind().name(), "KeyError");
//! ```

use alloc::borrow::Cow;
use core::{any::Any, error::Error, fmt, panic::Location};
use std::sync::{Mutex, PoisonError};

use triomphe::Arc;

use crate::{
    guard::metadata::FunctionMetadata,
    handlers::{self, Rendered, ValueHandler},
    hooks::{self, panic::PanicSite},
    into_fault::IntoFault,
    kind::{FaultKind, kinds},
    redact,
    trace::Trace,
};

/// How deep the `source()` chain of a foreign error is followed.
const MAX_SOURCE_DEPTH: usize = 16;

/// Where a fault was thrown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThrowSite {
    /// The source file.
    pub file: Cow<'static, str>,
    /// The line in `file`.
    pub line: u32,
    /// The column in `line`.
    pub column: u32,
}

impl ThrowSite {
    /// The location of the caller.
    #[track_caller]
    #[must_use]
    pub fn caller() -> Self {
        Self::from(Location::caller())
    }
}

impl From<&'static Location<'static>> for ThrowSite {
    fn from(location: &'static Location<'static>) -> Self {
        Self {
            file: Cow::Borrowed(location.file()),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for ThrowSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// A variable recorded at the throw site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Local {
    /// The variable name.
    pub name: String,
    /// The rendered value, already bounded in length.
    pub value: String,
}

/// A failure caught by a guarded call.
///
/// See the [module documentation](self) for how faults are created.
pub struct Fault {
    kind: &'static FaultKind,
    message: String,
    cause: Option<Box<Fault>>,
    context: Option<Box<Fault>>,
    suppress_context: bool,
    site: Option<ThrowSite>,
    function: Option<&'static str>,
    trace: Option<Trace>,
    locals: Vec<Local>,
    panic_payload: Mutex<Option<Box<dyn Any + Send>>>,
    attributions: Vec<Arc<FunctionMetadata>>,
}

impl Fault {
    /// Creates a fault of `kind` thrown at the caller's location.
    #[track_caller]
    pub fn new(kind: &'static FaultKind, message: impl Into<String>) -> Self {
        Self::bare(kind, message.into(), Some(ThrowSite::caller()), hooks::trace::capture())
    }

    fn bare(
        kind: &'static FaultKind,
        message: String,
        site: Option<ThrowSite>,
        trace: Option<Trace>,
    ) -> Self {
        Self {
            kind,
            message,
            cause: None,
            context: None,
            suppress_context: false,
            site,
            function: None,
            trace,
            locals: Vec::new(),
            panic_payload: Mutex::new(None),
            attributions: Vec::new(),
        }
    }

    /// Converts a boxed error, following its `source()` chain.
    #[track_caller]
    pub fn from_boxed(error: Box<dyn Error + Send + Sync + 'static>) -> Self {
        let mut fault = Self::new(kind_of_dyn(&*error), error.to_string());
        fault.cause = error
            .source()
            .map(|source| Box::new(Self::from_source(source, 1)));
        fault
    }

    /// Converts a foreign error. Conversions outside the target leave `site`
    /// empty; the guard fills it in with the call site.
    pub(crate) fn from_error<E>(error: E, site: Option<ThrowSite>) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        let mut fault = Self::bare(
            FaultKind::of::<E>(),
            error.to_string(),
            site,
            hooks::trace::capture(),
        );
        fault.cause = error
            .source()
            .map(|source| Box::new(Self::from_source(source, 1)));
        fault
    }

    fn from_source(error: &(dyn Error + 'static), depth: usize) -> Self {
        let mut fault = Self::bare(kind_of_dyn(error), error.to_string(), None, None);
        if depth < MAX_SOURCE_DEPTH {
            fault.cause = error
                .source()
                .map(|source| Box::new(Self::from_source(source, depth + 1)));
        }
        fault
    }

    /// Creates a fault from a caught panic payload.
    ///
    /// Uses the panic site recorded by the panic hook when there is one, and
    /// `fallback` otherwise.
    pub(crate) fn from_panic(
        payload: Box<dyn Any + Send>,
        fallback: Option<&'static Location<'static>>,
    ) -> Self {
        let message = panic_message(&*payload);
        let (site, trace) = match hooks::panic::take_last_panic() {
            Some(PanicSite { site, trace }) => (site, trace),
            None => (None, None),
        };
        let mut fault = Self::bare(
            kind_of_panic(&message),
            message,
            site.or_else(|| fallback.map(ThrowSite::from)),
            trace,
        );
        fault.panic_payload = Mutex::new(Some(payload));
        fault
    }

    /// Sets the fault that directly caused this one.
    #[track_caller]
    #[must_use]
    pub fn with_cause(mut self, cause: impl IntoFault) -> Self {
        self.cause = Some(Box::new(cause.into_fault()));
        self
    }

    /// Sets the fault that was being handled when this one was thrown.
    #[track_caller]
    #[must_use]
    pub fn with_context(mut self, context: impl IntoFault) -> Self {
        self.context = Some(Box::new(context.into_fault()));
        self
    }

    /// Hides the context link from chain traversal.
    #[must_use]
    pub fn suppress_context(mut self) -> Self {
        self.suppress_context = true;
        self
    }

    /// Records the enclosing function path, such as the output of
    /// [`function!`](crate::function!).
    #[must_use]
    pub fn in_function(mut self, path: &'static str) -> Self {
        self.function = Some(path);
        self
    }

    /// Replaces the stack captured at creation.
    #[must_use]
    pub fn with_trace(mut self, trace: Trace) -> Self {
        self.trace = Some(trace);
        self
    }

    /// Records a local variable with its `Debug` rendering.
    #[must_use]
    pub fn with_local<T: fmt::Debug + ?Sized>(mut self, name: impl Into<String>, value: &T) -> Self {
        self.record_local::<handlers::Debug, T>(name.into(), value);
        self
    }

    #[doc(hidden)]
    pub fn record_local<H: ValueHandler<T>, T: ?Sized>(&mut self, name: String, value: &T) {
        let value = redact::summarize(&Rendered::<H, T>::new(value), redact::LOCALS_LIMIT);
        self.locals.push(Local { name, value });
    }

    /// The kind of this fault.
    pub fn kind(&self) -> &'static FaultKind {
        self.kind
    }

    /// The fault message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The fault that directly caused this one.
    pub fn cause(&self) -> Option<&Fault> {
        self.cause.as_deref()
    }

    /// The fault that was being handled when this one was thrown.
    pub fn context(&self) -> Option<&Fault> {
        self.context.as_deref()
    }

    /// Whether the context link is hidden from chain traversal.
    pub fn is_context_suppressed(&self) -> bool {
        self.suppress_context
    }

    /// Where the fault was thrown, if known.
    pub fn site(&self) -> Option<&ThrowSite> {
        self.site.as_ref()
    }

    /// The path of the function that threw the fault, if recorded.
    pub fn function(&self) -> Option<&'static str> {
        self.function
    }

    /// The stack captured when the fault was created.
    pub fn trace(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }

    /// The locals recorded at the throw site.
    pub fn locals(&self) -> &[Local] {
        &self.locals
    }

    /// Returns `true` if this fault came from a caught panic.
    pub fn is_panic(&self) -> bool {
        self.panic_payload
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Takes the payload of the panic this fault was created from.
    pub fn take_panic_payload(&mut self) -> Option<Box<dyn Any + Send>> {
        self.panic_payload
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Metadata of the guarded layers this fault passed through, innermost
    /// first.
    pub fn attributions(&self) -> &[Arc<FunctionMetadata>] {
        &self.attributions
    }

    pub(crate) fn locate_if_unknown(&mut self, location: &'static Location<'static>) {
        if self.site.is_none() {
            self.site = Some(ThrowSite::from(location));
        }
    }

    pub(crate) fn attribute(&mut self, metadata: Arc<FunctionMetadata>) {
        self.attributions.push(metadata);
    }
}

impl<E> From<E> for Fault
where
    E: Error + Send + Sync + 'static,
{
    #[track_caller]
    fn from(error: E) -> Self {
        Self::from_error(error, Some(ThrowSite::caller()))
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if f.alternate() {
            let mut current = self.cause();
            while let Some(cause) = current {
                write!(f, "\ncaused by: {}: {}", cause.kind, cause.message)?;
                current = cause.cause();
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault")
            .field("kind", &self.kind.name())
            .field("message", &self.message)
            .field("cause", &self.cause)
            .field("context", &self.context)
            .field("suppress_context", &self.suppress_context)
            .field("site", &self.site)
            .field("locals", &self.locals)
            .field("is_panic", &self.is_panic())
            .finish_non_exhaustive()
    }
}

fn kind_of_dyn(error: &(dyn Error + 'static)) -> &'static FaultKind {
    macro_rules! first_known {
        ($($ty:ty),* $(,)?) => {
            $(
                if error.is::<$ty>() {
                    return FaultKind::of::<$ty>();
                }
            )*
        };
    }
    first_known!(
        std::io::Error,
        core::num::ParseIntError,
        core::num::ParseFloatError,
        core::str::ParseBoolError,
        core::num::TryFromIntError,
        core::str::Utf8Error,
        alloc::string::FromUtf8Error,
        core::fmt::Error,
        serde_json::Error,
    );
    &kinds::ERROR
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("Box<dyn Any>")
    }
}

/// Maps the messages of the standard library's arithmetic and indexing
/// panics onto their kinds.
fn kind_of_panic(message: &str) -> &'static FaultKind {
    if message.starts_with("attempt to divide by zero")
        || message.starts_with("attempt to calculate the remainder with a divisor of zero")
    {
        &kinds::ZERO_DIVISION_ERROR
    } else if message.starts_with("attempt to") && message.contains("with overflow") {
        &kinds::OVERFLOW_ERROR
    } else if message.starts_with("index out of bounds") {
        &kinds::INDEX_ERROR
    } else {
        &kinds::PANIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("config unreadable")]
    struct ConfigError(#[source] std::io::Error);

    #[test]
    fn test_new_records_site() {
        let line = line!() + 1;
        let fault = Fault::new(&kinds::VALUE_ERROR, "bad input");
        let site = fault.site().unwrap();
        assert_eq!(site.line, line);
        assert!(site.file.ends_with("fault.rs"));
        assert_eq!(fault.to_string(), "ValueError: bad input");
    }

    #[test]
    fn test_foreign_error_source_becomes_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing file");
        let fault = Fault::from(ConfigError(io));
        assert_eq!(fault.kind().name(), "ConfigError");
        let cause = fault.cause().unwrap();
        assert!(core::ptr::eq(cause.kind(), &kinds::IO_ERROR));
        assert_eq!(cause.message(), "missing file");
        assert!(cause.site().is_none());
        assert_eq!(
            format!("{fault:#}"),
            "ConfigError: config unreadable\ncaused by: IoError: missing file"
        );
    }

    #[test]
    fn test_from_panic_classifies_arithmetic() {
        hooks::panic::clear_last_panic();
        let mut fault = Fault::from_panic(Box::new("attempt to divide by zero"), Some(Location::caller()));
        assert!(core::ptr::eq(fault.kind(), &kinds::ZERO_DIVISION_ERROR));
        assert!(fault.is_panic());
        assert!(fault.take_panic_payload().is_some());
        assert!(!fault.is_panic());

        let fault = Fault::from_panic(Box::new(String::from("boom")), Some(Location::caller()));
        assert!(core::ptr::eq(fault.kind(), &kinds::PANIC));
        assert_eq!(fault.message(), "boom");

        let fault = Fault::from_panic(Box::new(7_u8), None);
        assert_eq!(fault.message(), "Box<dyn Any>");
        assert_eq!(
            kind_of_panic("attempt to add with overflow").name(),
            "OverflowError"
        );
    }

    #[test]
    fn test_locals_are_bounded() {
        let long = "x".repeat(400);
        let fault = Fault::new(&kinds::ERROR, "locals").with_local("long", &long);
        let local = &fault.locals()[0];
        assert_eq!(local.name, "long");
        assert_eq!(local.value.chars().count(), redact::LOCALS_LIMIT + 3);
        assert!(local.value.ends_with("..."));
    }

    #[test]
    fn test_context_and_suppression() {
        let fault = Fault::new(&kinds::RUNTIME_ERROR, "outer")
            .with_context(Fault::new(&kinds::KEY_ERROR, "inner"))
            .suppress_context();
        assert!(fault.is_context_suppressed());
        assert_eq!(fault.context().unwrap().message(), "inner");
    }
}
