//! Handlers that control how context values and locals are rendered in
//! reports.
//!
//! Reports are flat maps of strings, so every value that ends up in one has
//! to be turned into text. A handler decides how. The [`kwargs!`] and
//! [`locals!`] macros pick a handler automatically based on the traits the
//! value implements:
//!
//! 1. [`Display`] if the value implements [`core::fmt::Display`],
//! 2. otherwise [`struct@Debug`] if it implements [`core::fmt::Debug`],
//! 3. otherwise [`Any`], which only names the type.
//!
//! ```rust
//! use faultscan::kwargs;
//!
//! struct Opaque;
//!
//! let kwargs = kwargs! {
//!     "target_type" => "group",        // Display: group
//!     "ids" => vec![1, 2],             // Debug:   [1, 2]
//!     "handle" => Opaque,              // Any:     <object of type ...::Opaque>
//! };
//! assert_eq!(kwargs.get("target_type").unwrap().to_string(), "group");
//! assert_eq!(kwargs.get("ids").unwrap().to_string(), "[1, 2]");
//! ```
//!
//! [`kwargs!`]: crate::kwargs!
//! [`locals!`]: crate::locals!

use core::fmt;

/// Renders values of type `T` as text.
pub trait ValueHandler<T: ?Sized>: 'static {
    /// Writes the textual form of `value`.
    fn render(value: &T, formatter: &mut fmt::Formatter<'_>) -> fmt::Result;
}

/// Renders values through their [`Display`](core::fmt::Display)
/// implementation.
#[derive(Copy, Clone, Debug)]
pub struct Display;

impl<T: fmt::Display + ?Sized> ValueHandler<T> for Display {
    fn render(value: &T, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(value, formatter)
    }
}

/// Renders values through their [`Debug`](core::fmt::Debug) implementation.
#[derive(Copy, Clone, Debug)]
pub struct Debug;

impl<T: fmt::Debug + ?Sized> ValueHandler<T> for Debug {
    fn render(value: &T, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(value, formatter)
    }
}

/// Renders any value as a placeholder naming its type.
#[derive(Copy, Clone, Debug)]
pub struct Any;

impl<T: ?Sized> ValueHandler<T> for Any {
    fn render(_value: &T, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "<object of type {}>", core::any::type_name::<T>())
    }
}

/// Adapts a value and a handler into something [`Display`](core::fmt::Display)
/// can format.
pub(crate) struct Rendered<'a, H, T: ?Sized> {
    value: &'a T,
    _handler: core::marker::PhantomData<H>,
}

impl<'a, H, T: ?Sized> Rendered<'a, H, T> {
    pub(crate) fn new(value: &'a T) -> Self {
        Self {
            value,
            _handler: core::marker::PhantomData,
        }
    }
}

impl<H: ValueHandler<T>, T: ?Sized> fmt::Display for Rendered<'_, H, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        H::render(self.value, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Opaque;

    #[test]
    fn test_handlers() {
        assert_eq!(Rendered::<Display, _>::new("text").to_string(), "text");
        assert_eq!(Rendered::<Debug, _>::new("text").to_string(), "\"text\"");
        assert!(
            Rendered::<Any, _>::new(&Opaque)
                .to_string()
                .starts_with("<object of type ")
        );
    }
}
