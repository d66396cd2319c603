//! Metadata describing a guarded function.
//!
//! Rust cannot introspect a callable's name or signature at runtime, so the
//! metadata is captured when the guard is built. Name and module come from the
//! target's type name, file and line from the place the guard was built.
//! Documentation and parameter names can be declared explicitly:
//!
//! ```rust
//! use faultscan::guard::metadata::FunctionMetadata;
//!
//! let metadata = FunctionMetadata::named("billing::charge")
//!     .doc("Charges a customer.")
//!     .parameter("amount", "u64")
//!     .parameter("event", "Event");
//!
//! assert_eq!(metadata.name, "charge");
//! assert!(metadata.declares("event"));
//! ```

use alloc::borrow::Cow;
use core::panic::Location;

use crate::trace::{file_name, split_symbol};

/// A declared parameter of a guarded function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    /// The parameter name.
    pub name: Cow<'static, str>,
    /// The declared type, if given.
    pub annotation: Option<Cow<'static, str>>,
}

/// Describes a guarded function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionMetadata {
    /// The function name without its module path.
    pub name: Cow<'static, str>,
    /// The module path.
    pub module: Cow<'static, str>,
    /// Where the function was guarded.
    pub filename: Cow<'static, str>,
    /// The line where the function was guarded.
    pub line_number: u32,
    /// Documentation of the function.
    pub doc: Option<Cow<'static, str>>,
    /// Declared parameters. `None` if nothing was declared.
    pub parameters: Option<Vec<Parameter>>,
    /// Whether the function is abstract (a required trait method).
    pub is_abstract: bool,
}

impl FunctionMetadata {
    /// Metadata for the function at `path`, such as `app::ops::divide`,
    /// located at the caller.
    #[track_caller]
    pub fn named(path: &'static str) -> Self {
        Self::from_path(function_path(path), Location::caller())
    }

    /// Metadata for a callable whose type is called `type_name`, located at
    /// `location`.
    pub(crate) fn for_type_name(
        type_name: &'static str,
        location: &'static Location<'static>,
    ) -> Self {
        Self::from_path(function_path(type_name), location)
    }

    fn from_path(path: &'static str, location: &'static Location<'static>) -> Self {
        let (module, name) = split_symbol(path);
        Self {
            name: Cow::Borrowed(name),
            module: Cow::Borrowed(module.unwrap_or_else(|| file_name(location.file()))),
            filename: Cow::Borrowed(location.file()),
            line_number: location.line(),
            doc: None,
            parameters: None,
            is_abstract: false,
        }
    }

    /// Sets the documentation.
    #[must_use]
    pub fn doc(mut self, doc: impl Into<Cow<'static, str>>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Declares a parameter with its type.
    #[must_use]
    pub fn parameter(
        mut self,
        name: impl Into<Cow<'static, str>>,
        annotation: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.parameters.get_or_insert_with(Vec::new).push(Parameter {
            name: name.into(),
            annotation: Some(annotation.into()),
        });
        self
    }

    /// Declares parameters by name only.
    #[must_use]
    pub fn parameters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Cow<'static, str>>,
    {
        self.parameters
            .get_or_insert_with(Vec::new)
            .extend(names.into_iter().map(|name| Parameter {
                name: name.into(),
                annotation: None,
            }));
        self
    }

    /// Marks the function as abstract.
    #[must_use]
    pub fn set_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Overrides where the function is located.
    #[must_use]
    pub fn located_at(mut self, filename: impl Into<Cow<'static, str>>, line_number: u32) -> Self {
        self.filename = filename.into();
        self.line_number = line_number;
        self
    }

    /// Returns `true` if a parameter called `name` was declared.
    pub fn declares(&self, name: &str) -> bool {
        self.parameters
            .as_deref()
            .is_some_and(|parameters| parameters.iter().any(|p| p.name == name))
    }

    /// The parameter annotations, in declaration order.
    pub fn annotations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.parameters
            .iter()
            .flatten()
            .filter_map(|p| Some((p.name.as_ref(), p.annotation.as_deref()?)))
    }

    /// Report entries for this function under `prefix`.
    pub(crate) fn report_entries(&self, prefix: &str) -> [(String, String); 4] {
        [
            (format!("{prefix}_name"), self.name.to_string()),
            (format!("{prefix}_module"), self.module.to_string()),
            (format!("{prefix}_filename"), self.filename.to_string()),
            (format!("{prefix}_lineno"), self.line_number.to_string()),
        ]
    }
}

/// Strips closure markers from a type name, so that a closure defined in
/// `app::run` is named `app::run`.
pub(crate) fn function_path(type_name: &'static str) -> &'static str {
    let mut path = type_name;
    while let Some(stripped) = path.strip_suffix("::{{closure}}") {
        path = stripped;
    }
    path
}
