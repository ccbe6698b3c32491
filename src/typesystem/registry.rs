//! Central type registry.
//!
//! This module provides the `TypeRegistry`, a thread-safe arena of every [`ManagedType`]
//! that drives type finalization: creating a type builds its layout, binds it, and only
//! then makes the type visible.
//!
//! # Registry Architecture
//!
//! - **Handle-based lookup**: Primary index using [`TypeHandle`]s (`SkipMap`)
//! - **Name-based lookup**: Secondary index by type name (`DashMap`)
//! - **Handle generation**: Atomic counter, handles are never reused
//! - **Layout ids**: Random 32-bit hash keys from a seedable generator
//!
//! # Thread Safety
//!
//! Lookups are lock-free. Type creation only locks the id generator for the duration of a
//! single draw; layouts are immutable once bound, so a type is never observed half built.
//!
//! # Examples
//!
//! ```rust
//! use objlayout::{TypeRegistry, TypeSpec};
//!
//! let registry = TypeRegistry::new();
//! let base = registry.create_type(TypeSpec::new("Base").extension_size(16))?;
//! let derived = registry.create_type(
//!     TypeSpec::new("Derived").base(base.handle).extension_size(8),
//! )?;
//!
//! assert_eq!(derived.alloc_size(), 24);
//! assert_eq!(registry.get_by_name("Derived").len(), 1);
//! # Ok::<(), objlayout::Error>(())
//! ```

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc, Mutex,
};

use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;

use crate::{
    config::LayoutConfig,
    layout::{LayoutBuilder, LayoutRc, LayoutSource},
    typesystem::{ManagedType, ManagedTypeRc, RegionFlags, TypeHandle},
    Error::TypeNotFound,
    Result,
};

/// Description of a type to be created
#[derive(Debug, Clone, Default)]
pub struct TypeSpec {
    /// Type name
    pub name: String,
    /// Declared bases, in declaration order
    pub bases: Vec<TypeHandle>,
    /// Opaque regions that precede every instance
    pub flags: RegionFlags,
    /// Size of the object body starting at the base address
    pub basic_size: usize,
    /// Size of the extension block the type requests (0 for none)
    pub extension_size: usize,
}

impl TypeSpec {
    /// Start describing a type with the given name
    pub fn new(name: impl Into<String>) -> Self {
        TypeSpec {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Append a base type
    #[must_use]
    pub fn base(mut self, base: TypeHandle) -> Self {
        self.bases.push(base);
        self
    }

    /// Append several base types, keeping their order
    #[must_use]
    pub fn bases(mut self, bases: impl IntoIterator<Item = TypeHandle>) -> Self {
        self.bases.extend(bases);
        self
    }

    /// Set the opaque regions that precede every instance
    #[must_use]
    pub fn flags(mut self, flags: RegionFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the object body size
    #[must_use]
    pub fn basic_size(mut self, size: usize) -> Self {
        self.basic_size = size;
        self
    }

    /// Request a private extension block of `size` bytes
    #[must_use]
    pub fn extension_size(mut self, size: usize) -> Self {
        self.extension_size = size;
        self
    }
}

/// Arena of all types, and the driver of their finalization.
pub struct TypeRegistry {
    /// Primary storage: handle -> type
    types: SkipMap<TypeHandle, ManagedTypeRc>,
    /// Secondary index: types indexed by name (may have duplicates)
    types_by_name: DashMap<String, Vec<TypeHandle>>,
    /// Next handle to hand out
    next_handle: AtomicU32,
    /// Generator for layout ids
    ids: Mutex<fastrand::Rng>,
    /// Layout construction settings
    config: LayoutConfig,
}

impl TypeRegistry {
    /// Create an empty registry with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(LayoutConfig::default())
    }

    /// Create an empty registry
    ///
    /// ## Arguments
    /// * `config` - Layout construction settings used for every type
    #[must_use]
    pub fn with_config(config: LayoutConfig) -> Self {
        let rng = match config.id_seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };

        TypeRegistry {
            types: SkipMap::new(),
            types_by_name: DashMap::new(),
            next_handle: AtomicU32::new(1),
            ids: Mutex::new(rng),
            config,
        }
    }

    /// The layout construction settings
    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Get the next available handle and increment the counter
    fn next_handle(&self) -> TypeHandle {
        TypeHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    /// Create, finalize and register a new type.
    ///
    /// The type's layout is built from its bases before the type becomes visible. If the
    /// build fails the type is not registered and its handle is never reused.
    ///
    /// # Errors
    /// - [`crate::Error::TypeNotFound`] if a base is not registered
    /// - Any layout construction error, see [`LayoutBuilder::build`]
    pub fn create_type(&self, spec: TypeSpec) -> Result<ManagedTypeRc> {
        for base in &spec.bases {
            if !self.types.contains_key(base) {
                return Err(TypeNotFound(*base));
            }
        }

        let handle = self.next_handle();
        let id = lock!(self.ids).u32(..);

        let layout = LayoutBuilder::new(self, handle)
            .with_config(self.config)
            .bases(&spec.bases)
            .extension_size(spec.extension_size)
            .regions(spec.flags)
            .id(id)
            .build()?;

        let new_type = Arc::new(ManagedType::new(
            handle,
            spec.name,
            spec.bases,
            spec.flags,
            spec.basic_size,
            spec.flags.preceding_size(self.config.pointer_size),
        ));
        if let Some(layout) = layout {
            new_type.bind_layout(layout);
        }

        log::debug!(
            "registered type {} '{}' (extension {} bytes, alloc {} bytes)",
            handle,
            new_type.name,
            new_type.extension_size(),
            new_type.alloc_size()
        );

        self.insert(&new_type);
        Ok(new_type)
    }

    /// Insert an already finalized `ManagedType` into the registry
    ///
    /// ## Arguments
    /// * '`new_type`' - The type to register
    fn insert(&self, new_type: &ManagedTypeRc) {
        self.types.insert(new_type.handle, new_type.clone());
        self.types_by_name
            .entry(new_type.name.clone())
            .or_default()
            .push(new_type.handle);
    }

    /// Look up a type by its handle.
    ///
    /// # Thread Safety
    ///
    /// This method is thread-safe and lock-free for concurrent access.
    pub fn get(&self, handle: &TypeHandle) -> Option<ManagedTypeRc> {
        self.types.get(handle).map(|entry| entry.value().clone())
    }

    /// Look up all types registered under `name`, in registration order
    pub fn get_by_name(&self, name: &str) -> Vec<ManagedTypeRc> {
        self.types_by_name
            .get(name)
            .map(|handles| handles.iter().filter_map(|handle| self.get(handle)).collect())
            .unwrap_or_default()
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if no type has been registered
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterate over all types in handle order
    pub fn iter(&self) -> impl Iterator<Item = ManagedTypeRc> + '_ {
        self.types.iter().map(|entry| entry.value().clone())
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutSource for TypeRegistry {
    fn layout_of(&self, handle: TypeHandle) -> Option<LayoutRc> {
        self.types
            .get(&handle)
            .and_then(|entry| entry.value().layout().cloned())
    }
}
