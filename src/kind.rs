//! Fault kinds and the kind registry.
//!
//! Every [`Fault`](crate::Fault) carries a [`FaultKind`]. Kinds form a tree:
//! each kind except the root has a parent, and classification rules match a
//! fault against a configured kind if the fault's kind *is* that kind or
//! descends from it.
//!
//! Kinds are plain `static` items, so they can be compared by address:
//!
//! ```rust
//! use faultscan::kind::{FaultKind, kinds};
//!
//! static PARSE_ERROR: FaultKind = FaultKind::new("ParseError", &kinds::VALUE_ERROR);
//!
//! assert!(PARSE_ERROR.is_kind_of(&kinds::VALUE_ERROR));
//! assert!(PARSE_ERROR.is_kind_of(&kinds::ERROR));
//! assert!(!PARSE_ERROR.is_kind_of(&kinds::TYPE_ERROR));
//! ```
//!
//! Rust error types that flow into a fault through `?` are mapped onto kinds
//! through a process-wide registry keyed by [`TypeId`]. Unregistered types get
//! a kind of their own, named after the type and parented to [`kinds::ERROR`].

use core::{any::TypeId, fmt};
use std::sync::{PoisonError, RwLock};

use hashbrown::HashMap;
use rustc_hash::FxBuildHasher;

/// The classification of a fault.
///
/// See the [module documentation](self) for how kinds are matched.
#[derive(Debug)]
pub struct FaultKind {
    name: &'static str,
    parent: Option<&'static FaultKind>,
}

impl FaultKind {
    /// Creates a kind descending from `parent`.
    #[must_use]
    pub const fn new(name: &'static str, parent: &'static FaultKind) -> Self {
        Self {
            name,
            parent: Some(parent),
        }
    }

    /// Creates a kind without a parent.
    ///
    /// Most kinds should descend from [`kinds::ERROR`] instead.
    #[must_use]
    pub const fn root(name: &'static str) -> Self {
        Self { name, parent: None }
    }

    /// The name of this kind, which is also the sentinel returned to callers.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The parent of this kind, if any.
    #[must_use]
    pub const fn parent(&self) -> Option<&'static FaultKind> {
        self.parent
    }

    /// Iterates over this kind followed by all of its ancestors.
    pub fn ancestry(&self) -> impl Iterator<Item = &FaultKind> {
        core::iter::successors(Some(self), |kind| kind.parent.map(|p| p as &FaultKind))
    }

    /// Returns `true` if this kind is `other` or descends from it.
    #[must_use]
    pub fn is_kind_of(&self, other: &FaultKind) -> bool {
        self.ancestry().any(|kind| core::ptr::eq(kind, other))
    }

    /// Returns the kind registered for the Rust type `E`.
    ///
    /// If nothing was registered, a new kind named after the type is created
    /// and remembered, so repeated calls return the same kind.
    pub fn of<E: 'static>() -> &'static FaultKind {
        let type_id = TypeId::of::<E>();
        if let Some(kind) = registry_read(|registry| registry.by_type.get(&type_id).copied()) {
            return kind;
        }

        registry_write(|registry| {
            *registry.by_type.entry(type_id).or_insert_with(|| {
                let name = short_type_name(core::any::type_name::<E>());
                let kind: &'static FaultKind =
                    Box::leak(Box::new(FaultKind::new(name, &kinds::ERROR)));
                registry.by_name.entry(name).or_insert(kind);
                kind
            })
        })
    }

    /// Maps the Rust type `E` onto `kind`.
    ///
    /// Faults converted from `E` afterwards carry `kind`. The kind also
    /// becomes resolvable through [`FaultKind::lookup`].
    pub fn register<E: 'static>(kind: &'static FaultKind) {
        registry_write(|registry| {
            registry.by_type.insert(TypeId::of::<E>(), kind);
            registry.by_name.insert(kind.name, kind);
        });
    }

    /// Makes `kind` resolvable by name through [`FaultKind::lookup`].
    pub fn declare(kind: &'static FaultKind) {
        registry_write(|registry| {
            registry.by_name.insert(kind.name, kind);
        });
    }

    /// Resolves a kind by its name.
    ///
    /// The built-in kinds are always resolvable. Other kinds must have been
    /// declared, registered or created by [`FaultKind::of`] first.
    pub fn lookup(name: &str) -> Option<&'static FaultKind> {
        registry_read(|registry| registry.by_name.get(name).copied())
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Kinds available out of the box.
pub mod kinds {
    use super::FaultKind;

    /// The root of the built-in hierarchy.
    pub static ERROR: FaultKind = FaultKind::root("Error");
    /// Arithmetic failures.
    pub static ARITHMETIC_ERROR: FaultKind = FaultKind::new("ArithmeticError", &ERROR);
    /// Division or remainder by zero.
    pub static ZERO_DIVISION_ERROR: FaultKind =
        FaultKind::new("ZeroDivisionError", &ARITHMETIC_ERROR);
    /// Numeric overflow or lossy conversion.
    pub static OVERFLOW_ERROR: FaultKind = FaultKind::new("OverflowError", &ARITHMETIC_ERROR);
    /// A value with the right type but an unacceptable content.
    pub static VALUE_ERROR: FaultKind = FaultKind::new("ValueError", &ERROR);
    /// Text that is not valid in the expected encoding.
    pub static UNICODE_ERROR: FaultKind = FaultKind::new("UnicodeError", &VALUE_ERROR);
    /// A value of the wrong type or shape.
    pub static TYPE_ERROR: FaultKind = FaultKind::new("TypeError", &ERROR);
    /// A failed lookup.
    pub static LOOKUP_ERROR: FaultKind = FaultKind::new("LookupError", &ERROR);
    /// A missing key in a map.
    pub static KEY_ERROR: FaultKind = FaultKind::new("KeyError", &LOOKUP_ERROR);
    /// An out-of-range index.
    pub static INDEX_ERROR: FaultKind = FaultKind::new("IndexError", &LOOKUP_ERROR);
    /// Input/output failures.
    pub static IO_ERROR: FaultKind = FaultKind::new("IoError", &ERROR);
    /// Failures that fit no other kind.
    pub static RUNTIME_ERROR: FaultKind = FaultKind::new("RuntimeError", &ERROR);
    /// A panic that unwound out of a guarded call.
    pub static PANIC: FaultKind = FaultKind::new("Panic", &ERROR);

    pub(super) static BUILTIN: [&FaultKind; 13] = [
        &ERROR,
        &ARITHMETIC_ERROR,
        &ZERO_DIVISION_ERROR,
        &OVERFLOW_ERROR,
        &VALUE_ERROR,
        &UNICODE_ERROR,
        &TYPE_ERROR,
        &LOOKUP_ERROR,
        &KEY_ERROR,
        &INDEX_ERROR,
        &IO_ERROR,
        &RUNTIME_ERROR,
        &PANIC,
    ];
}

struct Registry {
    by_type: HashMap<TypeId, &'static FaultKind, FxBuildHasher>,
    by_name: HashMap<&'static str, &'static FaultKind, FxBuildHasher>,
    seeded: bool,
}

impl Registry {
    fn seed(&mut self) {
        if self.seeded {
            return;
        }
        self.seeded = true;

        for kind in kinds::BUILTIN {
            self.by_name.insert(kind.name, kind);
        }

        let std_types: [(TypeId, &'static FaultKind); 9] = [
            (TypeId::of::<std::io::Error>(), &kinds::IO_ERROR),
            (
                TypeId::of::<core::num::ParseIntError>(),
                &kinds::VALUE_ERROR,
            ),
            (
                TypeId::of::<core::num::ParseFloatError>(),
                &kinds::VALUE_ERROR,
            ),
            (
                TypeId::of::<core::str::ParseBoolError>(),
                &kinds::VALUE_ERROR,
            ),
            (
                TypeId::of::<core::num::TryFromIntError>(),
                &kinds::OVERFLOW_ERROR,
            ),
            (TypeId::of::<core::str::Utf8Error>(), &kinds::UNICODE_ERROR),
            (
                TypeId::of::<std::string::FromUtf8Error>(),
                &kinds::UNICODE_ERROR,
            ),
            (TypeId::of::<core::fmt::Error>(), &kinds::RUNTIME_ERROR),
            (TypeId::of::<serde_json::Error>(), &kinds::VALUE_ERROR),
        ];
        for (type_id, kind) in std_types {
            self.by_type.entry(type_id).or_insert(kind);
        }
    }
}

static REGISTRY: RwLock<Registry> = RwLock::new(Registry {
    by_type: HashMap::with_hasher(FxBuildHasher),
    by_name: HashMap::with_hasher(FxBuildHasher),
    seeded: false,
});

fn registry_read<R>(f: impl FnOnce(&Registry) -> Option<R>) -> Option<R> {
    {
        let registry = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
        if registry.seeded {
            return f(&registry);
        }
    }
    registry_write(|registry| f(registry))
}

fn registry_write<R>(f: impl FnOnce(&mut Registry) -> R) -> R {
    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    registry.seed();
    f(&mut registry)
}

/// Strips module paths and generic arguments from a type name.
///
/// `alloc::boxed::Box<dyn core::error::Error>` becomes `Box`, and
/// `my_crate::errors::ConfigError` becomes `ConfigError`.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(without_generics)
}

#[cfg(test)]
mod tests {
    use super::*;

    static CONFIG_ERROR: FaultKind = FaultKind::new("ConfigError", &kinds::VALUE_ERROR);

    #[derive(Debug)]
    struct Unregistered;

    #[derive(Debug)]
    struct MappedError;

    #[test]
    fn test_is_kind_of_walks_ancestors() {
        assert!(kinds::ZERO_DIVISION_ERROR.is_kind_of(&kinds::ZERO_DIVISION_ERROR));
        assert!(kinds::ZERO_DIVISION_ERROR.is_kind_of(&kinds::ARITHMETIC_ERROR));
        assert!(kinds::ZERO_DIVISION_ERROR.is_kind_of(&kinds::ERROR));
        assert!(!kinds::ARITHMETIC_ERROR.is_kind_of(&kinds::ZERO_DIVISION_ERROR));
        assert!(!kinds::KEY_ERROR.is_kind_of(&kinds::VALUE_ERROR));
    }

    #[test]
    fn test_ancestry_order() {
        let names: Vec<_> = CONFIG_ERROR.ancestry().map(FaultKind::name).collect();
        assert_eq!(names, ["ConfigError", "ValueError", "Error"]);
    }

    #[test]
    fn test_builtin_lookup() {
        let kind = FaultKind::lookup("ZeroDivisionError").unwrap();
        assert!(core::ptr::eq(kind, &kinds::ZERO_DIVISION_ERROR));
        assert!(FaultKind::lookup("NoSuchKind").is_none());
    }

    #[test]
    fn test_of_is_stable_for_unregistered_types() {
        let first = FaultKind::of::<Unregistered>();
        let second = FaultKind::of::<Unregistered>();
        assert!(core::ptr::eq(first, second));
        assert_eq!(first.name(), "Unregistered");
        assert!(first.is_kind_of(&kinds::ERROR));
    }

    #[test]
    fn test_std_types_are_seeded() {
        assert!(core::ptr::eq(
            FaultKind::of::<std::io::Error>(),
            &kinds::IO_ERROR
        ));
        assert!(core::ptr::eq(
            FaultKind::of::<core::num::ParseIntError>(),
            &kinds::VALUE_ERROR
        ));
    }

    #[test]
    fn test_register_and_declare() {
        FaultKind::register::<MappedError>(&CONFIG_ERROR);
        assert!(core::ptr::eq(FaultKind::of::<MappedError>(), &CONFIG_ERROR));
        assert!(core::ptr::eq(
            FaultKind::lookup("ConfigError").unwrap(),
            &CONFIG_ERROR
        ));
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name("std::io::error::Error"), "Error");
        assert_eq!(
            short_type_name("alloc::boxed::Box<dyn core::error::Error>"),
            "Box"
        );
        assert_eq!(short_type_name("Plain"), "Plain");
    }
}
