//! Process-wide hooks that run when faults are created.
//!
//! # Quick Start
//!
//! ```rust
//! use faultscan::{hooks::Hooks, trace::{Trace, TraceFrame}};
//!
//! // Record a (fake) stack for every fault
//! Hooks::new()
//!     .trace_collector(|| Some(Trace::new(vec![TraceFrame::from_symbol("app::main", "src/main.rs", 3)])))
//!     .install()
//!     .expect("failed to install hooks");
//! ```
//!
//! # Hook Types
//!
//! - **[`trace`]**: captures a call stack whenever a [`Fault`](crate::Fault) is
//!   created. Without a collector, faults only remember the source location
//!   where they were created, and the stack walker degrades to a single frame.
//!   The `faultscan-backtrace` crate provides a collector backed by the
//!   `backtrace` crate.
//! - **[`panic`]**: records where a panic happened so that a panic caught by
//!   a guarded call can be reported with its real location and stack, rather
//!   than the location of the guard.
//!
//! Hooks are global because they must run at the point a fault is thrown,
//! which can be arbitrarily deep below the guarded call. Everything that
//! happens *after* the fault is caught is configured per
//! [`Scanner`](crate::Scanner) instead.

pub(crate) mod hook_lock;
pub mod panic;
pub mod trace;

use core::{fmt, panic::Location};

use self::{
    hook_lock::HookLock,
    trace::{TraceCollector, UntypedTraceCollector},
};

/// Builder for configuring and installing hooks globally.
///
/// # Examples
///
/// ```rust
/// use faultscan::hooks::Hooks;
///
/// Hooks::new()
///     .capture_panic_sites()
///     .install()
///     .expect("failed to install hooks");
/// ```
#[derive(Debug)]
pub struct Hooks(HookData);

impl Default for Hooks {
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct HookData {
    pub(crate) trace_collector: Option<Box<dyn UntypedTraceCollector>>,
    pub(crate) panic_sites: bool,
    pub(crate) quiet_guarded_panics: bool,
    #[allow(dead_code, reason = "only used for debugging purposes")]
    pub(crate) created_at: &'static Location<'static>,
}

impl fmt::Debug for HookData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookData")
            .field(
                "trace_collector",
                &self.trace_collector.as_ref().map(|c| c.to_string()),
            )
            .field("panic_sites", &self.panic_sites)
            .field("quiet_guarded_panics", &self.quiet_guarded_panics)
            .field("created_at", &self.created_at)
            .finish()
    }
}

pub(crate) static HOOKS: HookLock<HookData> = HookLock::new();

/// Error returned when attempting to install hooks when they're already
/// installed.
///
/// Contains the hooks that were attempted to be installed, allowing you to
/// recover them if needed.
pub struct HooksAlreadyInstalledError(pub Hooks);

impl fmt::Debug for HooksAlreadyInstalledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HooksAlreadyInstalledError").finish()
    }
}

impl fmt::Display for HooksAlreadyInstalledError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hooks are already installed globally")
    }
}

impl core::error::Error for HooksAlreadyInstalledError {}

impl Hooks {
    /// Creates an empty `Hooks` builder.
    #[track_caller]
    pub fn new() -> Self {
        Self(HookData {
            trace_collector: None,
            panic_sites: false,
            quiet_guarded_panics: false,
            created_at: Location::caller(),
        })
    }

    /// Sets the collector that captures a stack for every new fault.
    ///
    /// Closures returning `Option<Trace>` are collectors too.
    #[track_caller]
    pub fn trace_collector<C>(mut self, collector: C) -> Self
    where
        C: TraceCollector,
    {
        self.0.trace_collector = Some(trace::collector_to_untyped(collector));
        self
    }

    /// Records the location (and, with a trace collector, the stack) of every
    /// panic, so guarded calls can report where a caught panic happened.
    ///
    /// The previously installed panic hook still runs afterwards.
    pub fn capture_panic_sites(mut self) -> Self {
        self.0.panic_sites = true;
        self
    }

    /// Like [`capture_panic_sites`](Self::capture_panic_sites), but skips the
    /// previously installed panic hook for panics that happen inside a guarded
    /// call. Those panics are reported through the sink instead of being
    /// printed.
    pub fn quiet_guarded_panics(mut self) -> Self {
        self.0.panic_sites = true;
        self.0.quiet_guarded_panics = true;
        self
    }

    /// Installs the hooks globally.
    ///
    /// If hooks are already installed, returns an error
    /// [`HooksAlreadyInstalledError`], containing the hooks that were attempted
    /// to be installed.
    ///
    /// See also [`replace`](Self::replace) which will replace any existing
    /// hooks without erroring.
    pub fn install(self) -> Result<(), HooksAlreadyInstalledError> {
        let mut guard = HOOKS.write();
        let slot = guard.get();
        if slot.is_some() {
            return Err(HooksAlreadyInstalledError(self));
        }
        if self.0.panic_sites {
            panic::ensure_panic_hook();
        }
        *slot = Some(self.0);
        Ok(())
    }

    /// Replaces the currently installed hooks with `self`.
    ///
    /// Returns the previously installed hooks, if any.
    pub fn replace(self) -> Option<Hooks> {
        if self.0.panic_sites {
            panic::ensure_panic_hook();
        }
        HOOKS.write().get().replace(self.0).map(Hooks)
    }

    /// Removes the currently installed hooks, returning them.
    pub fn uninstall() -> Option<Hooks> {
        HOOKS.write().get().take().map(Hooks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_output_names_collector() {
        let hooks = Hooks::new().trace_collector(|| None);
        let debug = format!("{hooks:?}");
        assert!(debug.contains("Trace collector"));
        assert!(debug.contains("panic_sites: false"));
    }
}
