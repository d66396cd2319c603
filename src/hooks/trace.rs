//! Stack capture when faults are created.
//!
//! A [`TraceCollector`] is asked for a [`Trace`] every time a
//! [`Fault`](crate::Fault) is created, while the frames that led to the fault
//! are still on the stack. The collector is free to return `None`, for example
//! when capturing is disabled through the environment.
//!
//! ## Using a Closure as a Trace Collector
//!
//! ```rust
//! use faultscan::{hooks::Hooks, trace::Trace};
//!
//! Hooks::new()
//!     .trace_collector(|| Some(Trace::default()))
//!     .install()
//!     .expect("failed to install hooks");
//! ```

use core::{fmt, panic::Location};

use crate::{hooks::HOOKS, trace::Trace};

/// Captures the current call stack.
///
/// Implementations run on the thread that creates the fault, with the
/// creating frames still live, so they can walk the stack directly.
pub trait TraceCollector: 'static + Send + Sync {
    /// Captures the stack of the calling thread.
    fn collect(&self) -> Option<Trace>;
}

impl<F> TraceCollector for F
where
    F: 'static + Send + Sync + Fn() -> Option<Trace>,
{
    fn collect(&self) -> Option<Trace> {
        self()
    }
}

pub(crate) trait UntypedTraceCollector: 'static + Send + Sync + fmt::Display {
    fn collect(&self) -> Option<Trace>;
}

#[track_caller]
pub(crate) fn collector_to_untyped<C>(collector: C) -> Box<dyn UntypedTraceCollector>
where
    C: TraceCollector,
{
    struct Hook<C> {
        collector: C,
        added_at: &'static Location<'static>,
    }

    impl<C> fmt::Display for Hook<C> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(
                f,
                "Trace collector {} registered at {}:{}",
                core::any::type_name::<C>(),
                self.added_at.file(),
                self.added_at.line()
            )
        }
    }

    impl<C: TraceCollector> UntypedTraceCollector for Hook<C> {
        fn collect(&self) -> Option<Trace> {
            self.collector.collect()
        }
    }

    Box::new(Hook {
        collector,
        added_at: Location::caller(),
    })
}

/// Captures a trace with the installed collector, if any.
///
/// A trace without frames counts as no trace.
pub fn capture() -> Option<Trace> {
    let hooks = HOOKS.read();
    let collector = hooks.get()?.trace_collector.as_ref()?;
    collector.collect().filter(|trace| !trace.is_empty())
}
