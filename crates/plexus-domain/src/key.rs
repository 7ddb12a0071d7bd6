//! Service keys and type references
//!
//! A [`ServiceKey`] is the canonical, comparable lookup identity of a
//! service contract: a raw type plus ordered, fully-concrete type arguments.
//! Unresolved type variables are never stored in a key - metadata that still
//! mentions variables uses [`TypeRef`] until resolution binds them.
//!
//! Rust reifies generics for concrete instantiations but gives no runtime
//! handle on a bare type constructor, so parameterized keys are composed
//! explicitly: the constructor is named by a marker type and the arguments
//! are keys in their own right.
//!
//! ```
//! use plexus_domain::key::{RawType, ServiceKey};
//!
//! struct Repository; // marker for the Repository<T> family
//! struct User;
//!
//! let user_repo =
//!     ServiceKey::parameterized(RawType::of::<Repository>(), vec![ServiceKey::of::<User>()]);
//! let order_repo =
//!     ServiceKey::parameterized(RawType::of::<Repository>(), vec![ServiceKey::of::<String>()]);
//! assert_ne!(user_repo, order_repo);
//! ```

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a Rust type (or of a marker standing for a generic type
/// constructor in erased positions)
#[derive(Clone, Copy, Debug)]
pub struct RawType {
    id: TypeId,
    name: &'static str,
}

impl RawType {
    /// Raw type of `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Full Rust path name of the type
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name, for display
    pub fn short_name(&self) -> &'static str {
        // Strip generic arguments first so `a::B<c::D>` yields `B`
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

// Identity is the TypeId alone; the name is carried for diagnostics
impl PartialEq for RawType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RawType {}

impl Hash for RawType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for RawType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Canonical lookup key: raw type plus ordered concrete type arguments
///
/// Equality requires an equal raw type and recursively equal arguments, so
/// `G<A>` and `G<B>` are distinct keys registered and resolved independently.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ServiceKey {
    raw: RawType,
    args: Vec<ServiceKey>,
}

impl ServiceKey {
    /// Bare key for a concrete type
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            raw: RawType::of::<T>(),
            args: Vec::new(),
        }
    }

    /// Key for a raw type with no arguments
    pub fn bare(raw: RawType) -> Self {
        Self {
            raw,
            args: Vec::new(),
        }
    }

    /// Key for a type constructor applied to concrete arguments
    pub fn parameterized(raw: RawType, args: Vec<ServiceKey>) -> Self {
        Self { raw, args }
    }

    /// The raw (constructor) type
    pub fn raw(&self) -> RawType {
        self.raw
    }

    /// The ordered type arguments
    pub fn args(&self) -> &[ServiceKey] {
        &self.args
    }

    /// True when the key carries type arguments
    pub fn is_parameterized(&self) -> bool {
        !self.args.is_empty()
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)?;
        if !self.args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{arg}")?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

/// How class metadata refers to a type before resolution
///
/// Members of a generic class name their produced and parameter types with
/// `TypeRef`s; type variables are bound to concrete keys at scan time from
/// the owning registration's context.
#[derive(Clone, Debug)]
pub enum TypeRef {
    /// Already-concrete key
    Key(ServiceKey),
    /// Type variable of the owning class, by declared name
    Param(&'static str),
    /// Constructor applied to possibly-variable arguments
    Generic {
        /// The type constructor
        raw: RawType,
        /// Arguments, each possibly still variable
        args: Vec<TypeRef>,
    },
}

impl TypeRef {
    /// Concrete reference to `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeRef::Key(ServiceKey::of::<T>())
    }

    /// Reference to a type variable by name
    pub fn param(name: &'static str) -> Self {
        TypeRef::Param(name)
    }

    /// Reference to a constructor applied to arguments
    pub fn generic(raw: RawType, args: Vec<TypeRef>) -> Self {
        TypeRef::Generic { raw, args }
    }

    /// The concrete key, when no variables remain
    pub fn as_key(&self) -> Option<&ServiceKey> {
        match self {
            TypeRef::Key(key) => Some(key),
            _ => None,
        }
    }
}

impl From<ServiceKey> for TypeRef {
    fn from(key: ServiceKey) -> Self {
        TypeRef::Key(key)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Key(key) => write!(f, "{key}"),
            TypeRef::Param(name) => write!(f, "{name}"),
            TypeRef::Generic { raw, args } => {
                write!(f, "{raw}<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ">")
            }
        }
    }
}

/// Requested wrapper shape of a lookup or injected parameter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    /// Plain value; zero matches or a null value is an error
    Bare,
    /// Absence (and null) map to empty, never an error
    Optional,
    /// Deferred lookup; `get()` may yield null
    Provider,
    /// All matches, possibly empty, null elements reported as present nulls
    Iterable,
    /// Deferred form of `Iterable`
    IterableProvider,
}

/// One injectable parameter: a wrapper shape around a referenced type
#[derive(Clone, Debug)]
pub struct ParamSpec {
    /// Wrapper shape
    pub shape: Shape,
    /// Referenced type, possibly still variable
    pub ty: TypeRef,
}

impl ParamSpec {
    /// Bare parameter
    pub fn bare(ty: impl Into<TypeRef>) -> Self {
        Self {
            shape: Shape::Bare,
            ty: ty.into(),
        }
    }

    /// Optional parameter
    pub fn optional(ty: impl Into<TypeRef>) -> Self {
        Self {
            shape: Shape::Optional,
            ty: ty.into(),
        }
    }

    /// Deferred provider parameter
    pub fn provider(ty: impl Into<TypeRef>) -> Self {
        Self {
            shape: Shape::Provider,
            ty: ty.into(),
        }
    }

    /// All-matches parameter
    pub fn iterable(ty: impl Into<TypeRef>) -> Self {
        Self {
            shape: Shape::Iterable,
            ty: ty.into(),
        }
    }

    /// Deferred all-matches parameter
    pub fn iterable_provider(ty: impl Into<TypeRef>) -> Self {
        Self {
            shape: Shape::IterableProvider,
            ty: ty.into(),
        }
    }
}
