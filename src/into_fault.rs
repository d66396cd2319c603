use core::error::Error;

use crate::fault::{Fault, ThrowSite};

/// Conversion into a [`Fault`].
///
/// Implemented for [`Fault`] itself and for every error type that is
/// `Send + Sync + 'static`. Guarded targets may fail with any `E: IntoFault`.
///
/// A converted error is located at the caller of
/// [`into_fault`](IntoFault::into_fault).
///
/// ```rust
/// use faultscan::{IntoFault, kind::kinds};
///
/// let error = "x".parse::<u8>().unwrap_err();
/// let fault = error.into_fault();
/// assert!(fault.kind().is_kind_of(&kinds::VALUE_ERROR));
/// ```
pub trait IntoFault {
    /// Converts `self` into a fault.
    #[track_caller]
    #[must_use]
    fn into_fault(self) -> Fault;

    /// Converts `self` into a fault without inventing a throw site.
    ///
    /// Faults keep the site they already have.
    #[doc(hidden)]
    #[must_use]
    fn into_fault_unlocated(self) -> Fault;
}

impl IntoFault for Fault {
    #[inline(always)]
    fn into_fault(self) -> Fault {
        self
    }

    #[inline(always)]
    fn into_fault_unlocated(self) -> Fault {
        self
    }
}

impl<E> IntoFault for E
where
    E: Error + Send + Sync + 'static,
{
    #[inline]
    fn into_fault(self) -> Fault {
        Fault::from_error(self, Some(ThrowSite::caller()))
    }

    #[inline]
    fn into_fault_unlocated(self) -> Fault {
        Fault::from_error(self, None)
    }
}
