//! Per-type extension data layouts.
//!
//! A type may privately own a fixed-size block of extension data that is attached to every
//! instance of itself and of its subtypes. The blocks of all owners in a hierarchy are placed
//! in front of the object's base address, behind any other opaque regions (GC header,
//! managed dict, managed weakref) that already precede it. A [`Layout`] records, for one
//! type, where every owner's block lives relative to the base address.
//!
//! # Key Components
//!
//! - [`Layout`]: Immutable per-type descriptor with its entry table
//! - [`LayoutEntry`]: One `(owner, offset)` slot of the entry table
//! - [`LayoutStrategy`]: The lookup strategy chosen at construction
//! - [`LayoutBuilder`]: Builds a layout once, when a type is finalized
//! - [`LayoutValidator`]: Post-build invariant checks
//!
//! # Lookup Strategies
//!
//! - **Ordered**: every owner has a unique order index, lookup is a single array access.
//!   Chosen whenever the inherited owners do not collide, which is always the case for
//!   single inheritance.
//! - **Hashed**: an open-addressed table with linear probing, used when multiple or diamond
//!   inheritance combines independently ordered base layouts. The hash shift is searched
//!   once at construction to minimise probing.
//!
//! Retrieval always requires the exact declaring type. Asking with a subtype of the
//! declaring type yields `None`, so inserting a new extension-owning type into the middle
//! of a hierarchy can never silently redirect existing callers to the wrong block.
//!
//! # Examples
//!
//! ```rust
//! use objlayout::{get_extension_data, ObjectBlock, TypeRegistry, TypeSpec};
//!
//! let registry = TypeRegistry::new();
//! let base = registry.create_type(TypeSpec::new("Base").extension_size(16))?;
//! let derived = registry.create_type(
//!     TypeSpec::new("Derived").base(base.handle).extension_size(8),
//! )?;
//!
//! let object = ObjectBlock::allocate(&derived)?;
//! assert!(get_extension_data(&object, &base).is_some());
//! assert!(get_extension_data(&object, &derived).is_some());
//! # Ok::<(), objlayout::Error>(())
//! ```

mod builder;
mod hashed;
mod ordered;
mod planner;
mod validator;

use std::{ptr::NonNull, sync::Arc};

pub use builder::{LayoutBuilder, LayoutSource};
pub use hashed::HASH_SHIFT_TRIALS;
pub use validator::LayoutValidator;

use crate::{
    object::ManagedObject,
    typesystem::{ManagedType, TypeHandle},
    Error, Result,
};

/// Reference to a `Layout`
pub type LayoutRc = Arc<Layout>;

/// A single slot of a layout's entry table.
///
/// An empty slot has no owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutEntry {
    /// The type owning the block, identity only
    pub owner: Option<TypeHandle>,
    /// Offset of the block relative to the object base address, always `<= 0`
    pub offset: i32,
}

/// The lookup strategy of a layout, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutStrategy {
    /// Direct indexed lookup by the target's order
    Ordered {
        /// `order + 1` slots, owners sit at their order index
        entries: Box<[LayoutEntry]>,
    },
    /// Open-addressed lookup by the target's id
    Hashed {
        /// `2 × owners` slots
        entries: Box<[LayoutEntry]>,
        /// Right shift applied to the id before the modulo
        shift: u32,
        /// Number of slots to probe before a miss is declared
        max_probe: u32,
    },
}

/// The lookup key a layout contributes when its type is requested from another layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutKey {
    /// The type the layout is bound to
    pub handle: TypeHandle,
    /// Index used by ordered lookups
    pub order: u32,
    /// Hash key used by hashed lookups
    pub id: u32,
}

/// Immutable per-type descriptor of where every owner's extension block lives.
///
/// A layout is built exactly once when its type is finalized and is read-only afterwards,
/// so it can be shared across threads and queried without locking.
#[derive(Debug)]
pub struct Layout {
    owner: TypeHandle,
    extension_size: usize,
    alloc_size: usize,
    base_offset: usize,
    order: u32,
    id: u32,
    strategy: LayoutStrategy,
}

impl Layout {
    /// The type this layout is bound to
    #[must_use]
    pub fn owner(&self) -> TypeHandle {
        self.owner
    }

    /// Bytes the bound type itself privately owns
    #[must_use]
    pub fn extension_size(&self) -> usize {
        self.extension_size
    }

    /// Total bytes of extension memory an instance requires, summed over all owners
    #[must_use]
    pub fn alloc_size(&self) -> usize {
        self.alloc_size
    }

    /// Bytes of opaque regions between the extension memory and the object base address
    #[must_use]
    pub fn base_offset(&self) -> usize {
        self.base_offset
    }

    /// Index of this type's block when inherited through an ordered layout
    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    /// Hash key of this type when looked up in a hashed layout
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The lookup strategy selected at construction
    #[must_use]
    pub fn strategy(&self) -> &LayoutStrategy {
        &self.strategy
    }

    /// Returns `true` if lookups are direct indexed
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        matches!(self.strategy, LayoutStrategy::Ordered { .. })
    }

    /// The key used to find this layout's type inside another layout
    #[must_use]
    pub fn key(&self) -> LayoutKey {
        LayoutKey {
            handle: self.owner,
            order: self.order,
            id: self.id,
        }
    }

    /// The raw entry table, including empty slots
    #[must_use]
    pub fn entries(&self) -> &[LayoutEntry] {
        match &self.strategy {
            LayoutStrategy::Ordered { entries } | LayoutStrategy::Hashed { entries, .. } => {
                entries
            }
        }
    }

    /// Iterate over all occupied slots as `(owner, offset)`
    pub fn owners(&self) -> impl Iterator<Item = (TypeHandle, i32)> + '_ {
        self.entries()
            .iter()
            .filter_map(|entry| entry.owner.map(|owner| (owner, entry.offset)))
    }

    /// Number of owners recorded in the entry table
    #[must_use]
    pub fn owner_count(&self) -> usize {
        self.owners().count()
    }

    /// Find the offset of the block owned by exactly `target`.
    ///
    /// ## Arguments
    /// * `target` - Key of the declaring type, see [`Layout::key`]
    #[must_use]
    pub fn offset_of(&self, target: &LayoutKey) -> Option<i32> {
        match &self.strategy {
            LayoutStrategy::Ordered { entries } => ordered::resolve(entries, target),
            LayoutStrategy::Hashed {
                entries,
                shift,
                max_probe,
            } => hashed::resolve(entries, *shift, *max_probe, target),
        }
    }

    /// Resolve the address of `target`'s block for an object whose base address is `base`.
    ///
    /// ## Arguments
    /// * `base` - Base address of an instance whose runtime type is bound to this layout
    /// * `target` - Key of the declaring type
    #[must_use]
    pub fn resolve(&self, base: NonNull<u8>, target: &LayoutKey) -> Option<NonNull<u8>> {
        let offset = self.offset_of(target)?;
        NonNull::new(base.as_ptr().wrapping_offset(offset as isize))
    }
}

/// Retrieve the extension block `ty` declared, for `object`.
///
/// Returns `None` if the object's runtime type or `ty` has no layout, or if `ty` is not
/// recorded as an owner in the object's layout. Only the exact declaring type is accepted;
/// subtypes of the declaring type never match.
///
/// The returned pointer is derived from [`ManagedObject::base_address`] and carries the same
/// provenance: for an object reached through a shared borrow it may only be read. Use
/// [`crate::ObjectBlock::extension_mut`] to write a block.
///
/// # Examples
///
/// ```rust
/// use objlayout::{get_extension_data, ObjectBlock, TypeRegistry, TypeSpec};
///
/// let registry = TypeRegistry::new();
/// let plain = registry.create_type(TypeSpec::new("Plain"))?;
/// let object = ObjectBlock::allocate(&plain)?;
/// assert!(get_extension_data(&object, &plain).is_none());
/// # Ok::<(), objlayout::Error>(())
/// ```
#[must_use]
pub fn get_extension_data<O: ManagedObject + ?Sized>(
    object: &O,
    ty: &ManagedType,
) -> Option<NonNull<u8>> {
    let object_layout = object.managed_type().layout()?;
    let type_layout = ty.layout()?;

    object_layout.resolve(object.base_address(), &type_layout.key())
}

/// The size of the extension block `ty` itself declared, or 0 if it has no layout.
#[must_use]
pub fn get_extension_size(ty: &ManagedType) -> usize {
    ty.layout().map_or(0, |layout| layout.extension_size())
}

/// Reserve `count` copies of `value`, reporting allocation failure instead of aborting
fn try_alloc<T: Clone>(count: usize, value: T) -> Result<Vec<T>> {
    let mut items = Vec::new();
    items
        .try_reserve_exact(count)
        .map_err(|_| Error::LayoutAllocation { entries: count })?;
    items.resize(count, value);
    Ok(items)
}

/// Reserve a zeroed entry table
fn alloc_entries(count: usize) -> Result<Vec<LayoutEntry>> {
    try_alloc(count, LayoutEntry::default())
}
