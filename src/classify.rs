//! Deciding what happens to a caught fault.

use crate::{kind::FaultKind, options::Options};

/// What a guarded call does with a fault.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Return the kind name without reporting.
    Ignore,
    /// Hand the fault back to the caller without reporting.
    Propagate,
    /// Report the fault and return the kind name.
    Capture,
}

/// Classifies a fault of `kind`.
///
/// The ignore list is checked first, then the propagate list. A kind matches
/// a listed kind if it is that kind or descends from it.
pub fn classify(kind: &FaultKind, options: &Options) -> Disposition {
    if options.ignore_errors.iter().any(|listed| kind.is_kind_of(listed)) {
        Disposition::Ignore
    } else if options
        .propagate_errors
        .iter()
        .any(|listed| kind.is_kind_of(listed))
    {
        Disposition::Propagate
    } else {
        Disposition::Capture
    }
}
