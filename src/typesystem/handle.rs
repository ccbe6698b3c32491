use std::fmt;
use std::hash::{Hash, Hasher};

/// A stable, comparable identity for a registered type.
///
/// A handle is an index into the [`crate::typesystem::TypeRegistry`] arena. It is
/// identity-only: holding a handle never keeps the type alive, and layouts use it purely
/// to recognise the exact type that owns an extension block.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TypeHandle(pub u32);

impl TypeHandle {
    /// Creates a new handle from a raw arena index
    #[must_use]
    pub fn new(value: u32) -> Self {
        TypeHandle(value)
    }

    /// Returns the raw arena index
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for TypeHandle {
    fn from(value: u32) -> Self {
        TypeHandle(value)
    }
}

impl From<TypeHandle> for u32 {
    fn from(handle: TypeHandle) -> Self {
        handle.0
    }
}

impl fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHandle({})", self.0)
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl Hash for TypeHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}
