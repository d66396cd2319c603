#![deny(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks,
    clippy::as_ptr_cast_mut,
    clippy::ptr_as_ptr,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    unused_doc_comments
)]
// Extra checks on nightly
#![cfg_attr(nightly_extra_checks, feature(rustdoc_missing_doc_code_examples))]
#![cfg_attr(nightly_extra_checks, forbid(rustdoc::missing_doc_code_examples))]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Intercept failing calls and hand structured error reports to a sink.
//!
//! ## Overview
//!
//! This crate wraps functions so that their failures are turned into
//! [`ErrorReport`]s: plain, serializable descriptions of what failed, where,
//! with which arguments, and through which chain of causes. Reports are handed
//! to a pluggable sink, so they can be logged, shipped to a collector, or
//! turned into alerts, without the failing code knowing about any of it.
//!
//! ## Quick Example
//!
//! ```
//! use faultscan::{Fault, Handler, Kwargs, Options, Outcome, Scanner, guard::adapter, kind::kinds};
//!
//! let scanner = Scanner::new();
//! scanner.set_handler(Some(Handler::blocking(|report: faultscan::ErrorReport| {
//!     println!("{}", serde_json::to_string_pretty(&report).unwrap());
//! })));
//!
//! let divide = scanner.guard(Options::default()).wrap(adapter::blocking(|(a, b): (i32, i32)| {
//!     a.checked_div(b)
//!         .ok_or_else(|| Fault::new(&kinds::ZERO_DIVISION_ERROR, "division by zero"))
//! }));
//!
//! assert_eq!(divide.call((10, 0), Kwargs::new()).unwrap(), Outcome::Captured("ZeroDivisionError"));
//! ```
//!
//! ## Core Concepts
//!
//! - A [`Fault`] is the failure a guard catches. It has a [`FaultKind`](kind::FaultKind),
//!   a message, an optional cause and context, and the place it was thrown.
//!   Any `std::error::Error` converts into one, and so do panics caught by a
//!   guard.
//! - A [`Guarded`] target classifies each fault with its [`Options`]: ignored
//!   faults are swallowed, propagated faults are handed back to the caller,
//!   and everything else is reported.
//! - A [`Scanner`] owns the sink. Reports built for captured faults are
//!   dispatched to its [`Handler`], inline or as detached work.
//!
//! Sensitive keyword arguments and locals are filtered by a
//! [`RedactionPolicy`](redact::RedactionPolicy) before they reach a report.
//!
//! ## Stack traces
//!
//! Rust keeps no stack after an error is returned, so faults capture one when
//! they are created, through the [`TraceCollector`](hooks::trace::TraceCollector)
//! installed with [`Hooks`](hooks::Hooks). The `faultscan-backtrace` crate
//! provides a collector built on the `backtrace` crate. Without a collector,
//! reports carry a single frame at the throw site.
//!
//! ## Logging
//!
//! The crate logs through `tracing` and never installs a subscriber. Sink
//! failures are logged at `warn`, failures to build a report at `error`, and
//! ignored or propagated faults at `debug`.

extern crate alloc;

#[macro_use]
mod macros;

pub mod args;
pub mod capture;
pub mod classify;
pub mod dispatch;
pub mod fault;
pub mod fault_ext;
pub mod guard;
pub mod handlers;
pub mod hooks;
pub mod kind;
pub mod options;
pub mod prelude;
pub mod redact;
pub mod report;
pub mod trace;
pub mod value;

mod into_fault;

pub use self::{
    dispatch::{AsyncReportSink, Handler, ReportSink, Scanner, SinkError},
    fault::{Fault, ThrowSite},
    guard::{GuardBuilder, Guarded, Outcome},
    into_fault::IntoFault,
    options::{Level, Options, OptionsError},
    report::ErrorReport,
    value::{ContextValue, Kwargs},
};

#[doc(hidden)]
pub mod __private {
    // Used by faultscan-backtrace to recognize frames inside this crate.
    pub const FAULTSCAN_LOCATION: &core::panic::Location = core::panic::Location::caller();

    #[doc(hidden)]
    pub use alloc::format;
    #[doc(hidden)]
    pub use core::result::Result::Err;

    #[doc(hidden)]
    pub fn type_name_of<T>(_: &T) -> &'static str {
        core::any::type_name::<T>()
    }

    #[doc(hidden)]
    pub fn enclosing_function(marker: &'static str) -> &'static str {
        let path = marker
            .strip_suffix("::__faultscan_marker")
            .unwrap_or(marker);
        crate::guard::metadata::function_path(path)
    }

    #[doc(hidden)]
    pub mod kind {
        use core::any::Any;

        use crate::{Fault, handlers, value::ContextValue};

        #[doc(hidden)]
        pub struct Wrap<'a, T: ?Sized>(pub &'a T);

        #[doc(hidden)]
        pub trait HandlerDisplayKind {
            #[inline(always)]
            fn handler(&self) -> handlers::Display {
                handlers::Display
            }
        }

        impl<T: ?Sized> HandlerDisplayKind for &&Wrap<'_, T> where handlers::Display: handlers::ValueHandler<T> {}

        #[doc(hidden)]
        pub trait HandlerDebugKind {
            #[inline(always)]
            fn handler(&self) -> handlers::Debug {
                handlers::Debug
            }
        }

        impl<T: ?Sized> HandlerDebugKind for &Wrap<'_, T> where handlers::Debug: handlers::ValueHandler<T> {}

        #[doc(hidden)]
        pub trait HandlerAnyKind {
            #[inline(always)]
            fn handler(&self) -> handlers::Any {
                handlers::Any
            }
        }

        impl<T: ?Sized> HandlerAnyKind for Wrap<'_, T> where handlers::Any: handlers::ValueHandler<T> {}

        #[doc(hidden)]
        #[must_use]
        pub fn context_value<H, T>(_handler: H, value: T) -> ContextValue
        where
            H: handlers::ValueHandler<T>,
            T: Any + Send + Sync,
        {
            ContextValue::new_custom::<H, T>(value)
        }

        #[doc(hidden)]
        pub fn record_local<H, T>(fault: &mut Fault, _handler: H, name: &str, value: &T)
        where
            H: handlers::ValueHandler<T>,
            T: ?Sized,
        {
            fault.record_local::<H, T>(name.to_string(), value);
        }
    }
}
