//! Redaction and bounded rendering of untrusted values.
//!
//! Everything a report says about arguments, context and locals passes
//! through here. Values under sensitive names are replaced by [`FILTERED`].
//! Other values are rendered into a bounded buffer and cut with `...` once
//! they exceed their limit. A value whose formatting fails or panics becomes
//! [`UNREPRESENTABLE`].

use alloc::borrow::Cow;
use core::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Placeholder for values under sensitive names.
pub const FILTERED: &str = "<filtered>";

/// Placeholder for values that could not be rendered.
pub const UNREPRESENTABLE: &str = "<unable to represent>";

/// Appended to values cut at their limit.
pub const ELLIPSIS: &str = "...";

/// Limit for positional arguments, in characters.
pub const ARGS_LIMIT: usize = 50;

/// Limit for keyword arguments, in characters.
pub const KWARGS_LIMIT: usize = 100;

/// Limit for local variables, in characters.
pub const LOCALS_LIMIT: usize = 150;

/// Names whose values are always filtered by the default policy.
pub const DEFAULT_SENSITIVE_NAMES: [&str; 7] = [
    "password",
    "token",
    "secret",
    "key",
    "api_key",
    "auth_token",
    "credentials",
];

/// Decides which names hold sensitive values.
///
/// A name is sensitive if it equals one of the configured names or starts
/// with the private prefix (`_` by default).
///
/// ```rust
/// use faultscan::redact::RedactionPolicy;
///
/// let policy = RedactionPolicy::default().with_name("ssn");
/// assert!(policy.is_sensitive("password"));
/// assert!(policy.is_sensitive("ssn"));
/// assert!(policy.is_sensitive("_cache"));
/// assert!(!policy.is_sensitive("user_id"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedactionPolicy {
    names: Vec<Cow<'static, str>>,
    private_prefix: Option<Cow<'static, str>>,
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self {
            names: DEFAULT_SENSITIVE_NAMES
                .iter()
                .map(|name| Cow::Borrowed(*name))
                .collect(),
            private_prefix: Some(Cow::Borrowed("_")),
        }
    }
}

impl RedactionPolicy {
    /// A policy that filters nothing.
    #[must_use]
    pub fn none() -> Self {
        Self {
            names: Vec::new(),
            private_prefix: None,
        }
    }

    /// Adds a sensitive name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.names.push(name.into());
        self
    }

    /// Replaces the private prefix. `None` disables prefix matching.
    #[must_use]
    pub fn with_private_prefix(mut self, prefix: Option<impl Into<Cow<'static, str>>>) -> Self {
        self.private_prefix = prefix.map(Into::into);
        self
    }

    /// Returns `true` if values under `name` must be filtered.
    pub fn is_sensitive(&self, name: &str) -> bool {
        self.names.iter().any(|sensitive| sensitive == name)
            || self
                .private_prefix
                .as_deref()
                .is_some_and(|prefix| name.starts_with(prefix))
    }

    /// Renders `value` under `name`, filtered or bounded to `limit`.
    pub fn render(&self, name: &str, value: &dyn fmt::Display, limit: usize) -> String {
        if self.is_sensitive(name) {
            String::from(FILTERED)
        } else {
            summarize(value, limit)
        }
    }

    /// Applies the policy to a value that was already rendered.
    pub fn apply(&self, name: &str, rendered: &str) -> String {
        if self.is_sensitive(name) {
            String::from(FILTERED)
        } else {
            rendered.to_string()
        }
    }
}

struct Bounded {
    buf: String,
    chars: usize,
    limit: usize,
    overflowed: bool,
}

impl fmt::Write for Bounded {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.chars == self.limit {
                self.overflowed = true;
                return Err(fmt::Error);
            }
            self.buf.push(c);
            self.chars += 1;
        }
        Ok(())
    }
}

/// Renders `value`, keeping at most `limit` characters.
///
/// Longer output is cut and followed by [`ELLIPSIS`]. Formatting stops as
/// soon as the limit is hit, so large values are never rendered in full. A
/// failing or panicking implementation yields [`UNREPRESENTABLE`].
pub fn summarize(value: &dyn fmt::Display, limit: usize) -> String {
    let mut out = Bounded {
        buf: String::new(),
        chars: 0,
        limit,
        overflowed: false,
    };
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        fmt::write(&mut out, format_args!("{value}"))
    }));

    match result {
        Ok(_) if out.overflowed => {
            out.buf.push_str(ELLIPSIS);
            out.buf
        }
        Ok(Ok(())) => out.buf,
        Ok(Err(_)) | Err(_) => String::from(UNREPRESENTABLE),
    }
}
