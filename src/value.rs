//! Type-erased keyword context.

use core::{any::Any, fmt};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::handlers::{self, ValueHandler};

type RenderFn = fn(&(dyn Any + Send + Sync), &mut fmt::Formatter<'_>) -> fmt::Result;

/// A keyword value together with the handler that renders it.
///
/// Plain scalars and strings convert with [`From`] and render through
/// `Display`. Use [`ContextValue::debug`] or the [`kwargs!`](crate::kwargs!)
/// macro for anything else.
#[derive(Clone)]
pub struct ContextValue {
    value: Arc<dyn Any + Send + Sync>,
    render: RenderFn,
}

fn render_erased<H, T>(value: &(dyn Any + Send + Sync), f: &mut fmt::Formatter<'_>) -> fmt::Result
where
    H: ValueHandler<T>,
    T: 'static,
{
    match value.downcast_ref::<T>() {
        Some(value) => H::render(value, f),
        None => Err(fmt::Error),
    }
}

impl ContextValue {
    /// Wraps `value`, rendering it with the handler `H`.
    pub fn new_custom<H, T>(value: T) -> Self
    where
        H: ValueHandler<T>,
        T: Any + Send + Sync,
    {
        Self {
            value: Arc::new(value),
            render: render_erased::<H, T>,
        }
    }

    /// Wraps `value`, rendering it through `Display`.
    pub fn display<T: fmt::Display + Any + Send + Sync>(value: T) -> Self {
        Self::new_custom::<handlers::Display, T>(value)
    }

    /// Wraps `value`, rendering it through `Debug`.
    pub fn debug<T: fmt::Debug + Any + Send + Sync>(value: T) -> Self {
        Self::new_custom::<handlers::Debug, T>(value)
    }

    /// Returns the wrapped value if it has type `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.value).downcast_ref::<T>()
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self.render)(&*self.value, f)
    }
}

impl fmt::Debug for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self.render)(&*self.value, f)
    }
}

macro_rules! display_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ContextValue {
                fn from(value: $ty) -> Self {
                    Self::display(value)
                }
            }
        )*
    };
}

display_from!(
    String, &'static str, bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128,
    usize, f32, f64,
);

impl From<alloc::borrow::Cow<'static, str>> for ContextValue {
    fn from(value: alloc::borrow::Cow<'static, str>) -> Self {
        Self::display(value.into_owned())
    }
}

/// Keyword arguments passed to a guarded call, in insertion order.
///
/// Keys that control reporting (`target_type`, `event`, `custom_context`, and
/// so on) are visible in reports but never reach the target unless it
/// declares a parameter with that name.
#[derive(Clone, Debug, Default)]
pub struct Kwargs(IndexMap<String, ContextValue>);

impl Kwargs {
    /// Creates empty keyword arguments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the previous value under `key`.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ContextValue>,
    ) -> Option<ContextValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Looks up a value.
    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.0.get(key)
    }

    /// Looks up a value of type `T`.
    pub fn get_as<T: Any>(&self, key: &str) -> Option<&T> {
        self.get(key)?.downcast_ref()
    }

    /// Removes a value, keeping the order of the rest.
    pub fn remove(&mut self, key: &str) -> Option<ContextValue> {
        self.0.shift_remove(key)
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the entries in insertion order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, ContextValue> {
        self.0.iter()
    }

    /// Iterates over the keys in insertion order.
    pub fn keys(&self) -> indexmap::map::Keys<'_, String, ContextValue> {
        self.0.keys()
    }

    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.0.retain(|key, _| keep(key));
    }
}

impl<K: Into<String>, V: Into<ContextValue>> FromIterator<(K, V)> for Kwargs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<ContextValue>> Extend<(K, V)> for Kwargs {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.0
            .extend(iter.into_iter().map(|(key, value)| (key.into(), value.into())));
    }
}

impl IntoIterator for Kwargs {
    type Item = (String, ContextValue);
    type IntoIter = indexmap::map::IntoIter<String, ContextValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Kwargs {
    type Item = (&'a String, &'a ContextValue);
    type IntoIter = indexmap::map::Iter<'a, String, ContextValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
