//! Positional arguments of a guarded call.

use core::fmt;

use crate::{handlers, handlers::Rendered, redact};

/// A tuple of positional arguments that can describe itself in a report.
///
/// Implemented for `()` and for tuples of up to twelve `Debug` values. A
/// target taking a single argument receives it as a one-element tuple.
///
/// ```rust
/// use faultscan::args::Arguments;
///
/// let summary = (10, "abc").summarize(50);
/// assert_eq!(summary, ["10", "\"abc\""]);
/// ```
pub trait Arguments {
    /// Renders each argument in order, bounded to `limit` characters.
    fn summarize(&self, limit: usize) -> Vec<String>;
}

fn summarize_one<T: fmt::Debug + ?Sized>(value: &T, limit: usize) -> String {
    redact::summarize(&Rendered::<handlers::Debug, T>::new(value), limit)
}

impl Arguments for () {
    fn summarize(&self, _limit: usize) -> Vec<String> {
        Vec::new()
    }
}

macro_rules! tuple_arguments {
    ($($name:ident),+) => {
        impl<$($name: fmt::Debug),+> Arguments for ($($name,)+) {
            #[allow(non_snake_case)]
            fn summarize(&self, limit: usize) -> Vec<String> {
                let ($($name,)+) = self;
                vec![$(summarize_one($name, limit)),+]
            }
        }
    };
}

tuple_arguments!(A);
tuple_arguments!(A, B);
tuple_arguments!(A, B, C);
tuple_arguments!(A, B, C, D);
tuple_arguments!(A, B, C, D, E);
tuple_arguments!(A, B, C, D, E, F);
tuple_arguments!(A, B, C, D, E, F, G);
tuple_arguments!(A, B, C, D, E, F, G, H);
tuple_arguments!(A, B, C, D, E, F, G, H, I);
tuple_arguments!(A, B, C, D, E, F, G, H, I, J);
tuple_arguments!(A, B, C, D, E, F, G, H, I, J, K);
tuple_arguments!(A, B, C, D, E, F, G, H, I, J, K, L);
