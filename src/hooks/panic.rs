//! Panic-site capture.
//!
//! `catch_unwind` hands back only the panic payload; by then the stack that
//! panicked is gone. When [`Hooks::capture_panic_sites`](super::Hooks::capture_panic_sites)
//! is enabled, a panic hook records the location and (with a trace collector)
//! the stack of each panic in a thread-local slot. A guarded call that catches
//! the panic takes the record from that slot on the same thread.

use std::{
    cell::{Cell, RefCell},
    panic::PanicHookInfo,
    sync::Once,
};

use crate::{fault::ThrowSite, hooks::HOOKS, trace::Trace};

/// What the panic hook recorded about the most recent panic on a thread.
#[derive(Clone, Debug)]
pub struct PanicSite {
    /// Where the panic happened.
    pub site: Option<ThrowSite>,
    /// The stack at the point of the panic, if a trace collector is installed.
    pub trace: Option<Trace>,
}

thread_local! {
    static LAST_PANIC: RefCell<Option<PanicSite>> = const { RefCell::new(None) };
    static GUARD_DEPTH: Cell<usize> = const { Cell::new(0) };
}

static INSTALL_PANIC_HOOK: Once = Once::new();

pub(crate) fn ensure_panic_hook() {
    INSTALL_PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let (record, quiet) = {
                let hooks = HOOKS.read();
                match hooks.get() {
                    Some(data) => (data.panic_sites, data.quiet_guarded_panics),
                    None => (false, false),
                }
            };

            if record {
                record_panic(info);
            }
            if !(quiet && in_guarded_call()) {
                previous(info);
            }
        }));
    });
}

fn record_panic(info: &PanicHookInfo<'_>) {
    let site = info.location().map(|location| ThrowSite {
        file: location.file().to_string().into(),
        line: location.line(),
        column: location.column(),
    });
    let trace = super::trace::capture();
    LAST_PANIC.with(|slot| {
        if let Ok(mut slot) = slot.try_borrow_mut() {
            *slot = Some(PanicSite { site, trace });
        }
    });
}

/// Takes the record of the most recent panic on this thread.
pub fn take_last_panic() -> Option<PanicSite> {
    LAST_PANIC.with(|slot| slot.try_borrow_mut().ok().and_then(|mut slot| slot.take()))
}

pub(crate) fn clear_last_panic() {
    let _ = take_last_panic();
}

fn in_guarded_call() -> bool {
    GUARD_DEPTH.with(|depth| depth.get() > 0)
}

/// Marks the current thread as running guarded code until dropped.
pub(crate) struct GuardScope(());

impl GuardScope {
    pub(crate) fn enter() -> Self {
        GUARD_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self(())
    }
}

impl Drop for GuardScope {
    fn drop(&mut self) {
        GUARD_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_scope_nesting() {
        assert!(!in_guarded_call());
        {
            let _outer = GuardScope::enter();
            assert!(in_guarded_call());
            {
                let _inner = GuardScope::enter();
                assert!(in_guarded_call());
            }
            assert!(in_guarded_call());
        }
        assert!(!in_guarded_call());
    }

    #[test]
    fn test_take_last_panic_empties_slot() {
        LAST_PANIC.with(|slot| {
            *slot.borrow_mut() = Some(PanicSite {
                site: None,
                trace: None,
            })
        });
        assert!(take_last_panic().is_some());
        assert!(take_last_panic().is_none());
    }
}
