//! Minimal type system consumed by the layout resolver.
//!
//! This module provides just enough of a type system to drive layout construction: stable
//! type identities, declared bases, the opaque regions preceding instances, and the slot
//! where each type's layout is bound once it is finalized.
//!
//! # Key Components
//!
//! - [`ManagedType`]: A registered type and its layout slot
//! - [`TypeHandle`]: Identity-only handle into the registry arena
//! - [`TypeRegistry`]: Arena of all types; finalizes types as they are created
//! - [`TypeSpec`]: Description of a type to be created
//! - [`RegionFlags`] / [`PointerSize`]: Sizing of the regions in front of an object
//!
//! # Examples
//!
//! ```rust
//! use objlayout::{RegionFlags, TypeRegistry, TypeSpec};
//!
//! let registry = TypeRegistry::new();
//! let widget = registry.create_type(
//!     TypeSpec::new("Widget")
//!         .flags(RegionFlags::HAVE_GC)
//!         .basic_size(32)
//!         .extension_size(16),
//! )?;
//!
//! assert_eq!(widget.extension_size(), 16);
//! assert!(widget.instance_size() >= Some(32 + 16));
//! # Ok::<(), objlayout::Error>(())
//! ```

mod flags;
mod handle;
mod registry;

use std::sync::{Arc, OnceLock};

pub use flags::{PointerSize, RegionFlags};
pub use handle::TypeHandle;
pub use registry::{TypeRegistry, TypeSpec};

use crate::layout::{get_extension_size, LayoutRc};

/// Reference to a `ManagedType`
pub type ManagedTypeRc = Arc<ManagedType>;

/// A finalized type whose instances may carry extension data.
pub struct ManagedType {
    /// Handle
    pub handle: TypeHandle,
    /// Type name, not required to be unique
    pub name: String,
    /// Declared bases, in declaration order
    pub bases: Vec<TypeHandle>,
    /// Opaque regions that precede every instance
    pub flags: RegionFlags,
    /// Size of the object body starting at the base address
    pub basic_size: usize,
    /// Bytes occupied by the opaque regions for the registry's pointer width
    pub preceding_size: usize,
    /// Layout slot, populated at most once during finalization
    layout: OnceLock<LayoutRc>,
}

impl ManagedType {
    /// Create a new instance of a `ManagedType` with an empty layout slot
    pub fn new(
        handle: TypeHandle,
        name: String,
        bases: Vec<TypeHandle>,
        flags: RegionFlags,
        basic_size: usize,
        preceding_size: usize,
    ) -> Self {
        ManagedType {
            handle,
            name,
            bases,
            flags,
            basic_size,
            preceding_size,
            layout: OnceLock::new(),
        }
    }

    /// The layout bound to this type, if it needs one
    pub fn layout(&self) -> Option<&LayoutRc> {
        self.layout.get()
    }

    /// Bind `layout` to this type.
    ///
    /// Returns `false` if a layout was already bound; the existing one is kept.
    pub fn bind_layout(&self, layout: LayoutRc) -> bool {
        self.layout.set(layout).is_ok()
    }

    /// Bytes of extension data this type itself declared
    pub fn extension_size(&self) -> usize {
        get_extension_size(self)
    }

    /// Total extension memory an instance requires, over all owners
    pub fn alloc_size(&self) -> usize {
        self.layout().map_or(0, |layout| layout.alloc_size())
    }

    /// Bytes in front of the base address: extension memory plus preceding regions
    ///
    /// Returns `None` if the sum does not fit a `usize`.
    pub fn instance_prefix(&self) -> Option<usize> {
        self.preceding_size.checked_add(self.alloc_size())
    }

    /// The size to request from an allocator for one instance
    ///
    /// Returns `None` if the sum does not fit a `usize`.
    pub fn instance_size(&self) -> Option<usize> {
        self.instance_prefix()?.checked_add(self.basic_size)
    }
}

impl std::fmt::Debug for ManagedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedType")
            .field("handle", &self.handle)
            .field("name", &self.name)
            .field("bases", &self.bases)
            .field("flags", &self.flags)
            .field("basic_size", &self.basic_size)
            .field("has_layout", &self.layout().is_some())
            .finish()
    }
}
