//! Layout construction for newly finalized types.
//!
//! This module provides the [`LayoutBuilder`], which is invoked once per type, after the
//! type's bases are known and before the first instance is allocated. It collects the
//! extension-owning ancestors, decides between ordered and hashed lookup, plans the block
//! offsets and returns an immutable [`Layout`].
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use objlayout::{LayoutBuilder, LayoutRc, LayoutSource, TypeHandle};
//!
//! struct Layouts(HashMap<TypeHandle, LayoutRc>);
//!
//! impl LayoutSource for Layouts {
//!     fn layout_of(&self, handle: TypeHandle) -> Option<LayoutRc> {
//!         self.0.get(&handle).cloned()
//!     }
//! }
//!
//! let mut layouts = Layouts(HashMap::new());
//! let base = TypeHandle::new(1);
//! let layout = LayoutBuilder::new(&layouts, base)
//!     .extension_size(16)
//!     .build()?
//!     .expect("a type with extension data always gets a layout");
//! layouts.0.insert(base, layout);
//!
//! let derived = LayoutBuilder::new(&layouts, TypeHandle::new(2))
//!     .bases(&[base])
//!     .extension_size(8)
//!     .build()?
//!     .expect("inherits a block");
//! assert_eq!(derived.alloc_size(), 24);
//! # Ok::<(), objlayout::Error>(())
//! ```

use std::{collections::HashSet, sync::Arc};

use crate::{
    config::LayoutConfig,
    layout::{
        hashed, ordered,
        planner::{plan_offsets, OwnerSlot},
        Layout, LayoutRc, LayoutStrategy, LayoutValidator,
    },
    typesystem::{RegionFlags, TypeHandle},
    Error, Result,
};

/// Access to the layouts of already finalized types.
///
/// The builder only knows owners by handle; this trait is how it reaches their layouts to
/// read their size, order and id. [`crate::TypeRegistry`] implements it.
pub trait LayoutSource {
    /// The layout bound to `handle`, if the type has one
    fn layout_of(&self, handle: TypeHandle) -> Option<LayoutRc>;
}

/// Builds the layout of one type.
pub struct LayoutBuilder<'a, S: LayoutSource + ?Sized> {
    source: &'a S,
    owner: TypeHandle,
    bases: Vec<TypeHandle>,
    requested: usize,
    regions: RegionFlags,
    id: Option<u32>,
    config: LayoutConfig,
}

impl<'a, S: LayoutSource + ?Sized> LayoutBuilder<'a, S> {
    /// Create a builder for the type identified by `owner`
    ///
    /// ## Arguments
    /// * `source` - Lookup of the layouts of already finalized types
    /// * `owner` - The type the layout will be bound to
    pub fn new(source: &'a S, owner: TypeHandle) -> Self {
        LayoutBuilder {
            source,
            owner,
            bases: Vec::new(),
            requested: 0,
            regions: RegionFlags::empty(),
            id: None,
            config: LayoutConfig::default(),
        }
    }

    /// Set the construction configuration
    #[must_use]
    pub fn with_config(mut self, config: LayoutConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the declared bases, in declaration order
    #[must_use]
    pub fn bases(mut self, bases: &[TypeHandle]) -> Self {
        self.bases = bases.to_vec();
        self
    }

    /// Set the size of the extension block the type itself requests (0 for none)
    #[must_use]
    pub fn extension_size(mut self, size: usize) -> Self {
        self.requested = size;
        self
    }

    /// Set the opaque regions that precede instances of the type
    #[must_use]
    pub fn regions(mut self, regions: RegionFlags) -> Self {
        self.regions = regions;
        self
    }

    /// Use `id` as the type's hash key instead of drawing a random one
    #[must_use]
    pub fn id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }

    /// Build the layout.
    ///
    /// Returns `Ok(None)` if neither the type nor any ancestor owns extension data; such
    /// types never carry a layout.
    ///
    /// # Errors
    /// - [`Error::ExtensionSizeLimit`] if the requested size exceeds the configured maximum
    /// - [`Error::LayoutOverflow`] if offsets do not fit the signed 32-bit range
    /// - [`Error::LayoutAllocation`] if the entry table cannot be allocated
    /// - [`Error::Malformed`] if a base layout is inconsistent or validation fails
    pub fn build(self) -> Result<Option<LayoutRc>> {
        if self.requested > self.config.max_extension_size {
            return Err(Error::ExtensionSizeLimit {
                requested: self.requested,
                limit: self.config.max_extension_size,
            });
        }
        let extension_size = self
            .config
            .align(self.requested)
            .ok_or(Error::LayoutOverflow {
                size: self.requested,
            })?;

        let ancestors = self.collect_ancestors()?;
        if ancestors.is_empty() && extension_size == 0 {
            return Ok(None);
        }

        let order = u32::try_from(ancestors.len()).map_err(|_| Error::LayoutOverflow {
            size: ancestors.len(),
        })?;
        let id = self.id.unwrap_or_else(|| fastrand::u32(..));
        let is_ordered = ordered::is_collision_free(&ancestors)?;

        let mut owners = ancestors;
        let owns_block = extension_size > 0;
        if owns_block {
            owners.push(OwnerSlot::new(self.owner, extension_size, order, id));
        }

        let base_offset = self.regions.preceding_size(self.config.pointer_size);
        let alloc_size = plan_offsets(base_offset, &mut owners)?;

        let strategy = if is_ordered {
            LayoutStrategy::Ordered {
                entries: ordered::build_table(order, &owners)?,
            }
        } else {
            // The type's own block is placed first so it gets its ideal slot
            if owns_block {
                owners.rotate_right(1);
            }
            let table = hashed::build_hash_table(&owners)?;
            LayoutStrategy::Hashed {
                entries: table.entries,
                shift: table.shift,
                max_probe: table.max_probe,
            }
        };

        let layout = Layout {
            owner: self.owner,
            extension_size,
            alloc_size,
            base_offset,
            order,
            id,
            strategy,
        };

        if self.config.validate_layouts {
            LayoutValidator::validate_owners(&layout, &owners)?;
        }

        match &layout.strategy {
            LayoutStrategy::Ordered { .. } => log::debug!(
                "built ordered layout for {}: {} owners, order {}, alloc size {}",
                self.owner,
                owners.len(),
                order,
                alloc_size
            ),
            LayoutStrategy::Hashed {
                shift, max_probe, ..
            } => log::debug!(
                "built hashed layout for {}: {} owners, shift {}, max probe {}, alloc size {}",
                self.owner,
                owners.len(),
                shift,
                max_probe,
                alloc_size
            ),
        }

        Ok(Some(Arc::new(layout)))
    }

    /// Gather every extension-owning ancestor reachable through the bases.
    ///
    /// Each base's layout already lists all owners above it, so a single merge pass over
    /// the direct bases is enough. Owners reached through several paths are kept once, in
    /// first-seen order; within one base, owners closest to the object come first.
    fn collect_ancestors(&self) -> Result<Vec<OwnerSlot>> {
        let mut seen: HashSet<TypeHandle> = HashSet::new();
        let mut ancestors = Vec::new();

        for base in &self.bases {
            let Some(base_layout) = self.source.layout_of(*base) else {
                continue;
            };

            let mut inherited: Vec<(TypeHandle, i32)> = base_layout.owners().collect();
            inherited.sort_by(|a, b| b.1.cmp(&a.1));

            for (handle, _) in inherited {
                if !seen.insert(handle) {
                    continue;
                }

                let owner_layout = if handle == base_layout.owner() {
                    base_layout.clone()
                } else {
                    self.source.layout_of(handle).ok_or_else(|| {
                        malformed_error!(
                            "Layout of {} records owner {} which has no layout",
                            base,
                            handle
                        )
                    })?
                };

                ancestors.push(OwnerSlot::new(
                    handle,
                    owner_layout.extension_size(),
                    owner_layout.order(),
                    owner_layout.id(),
                ));
            }
        }

        Ok(ancestors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        layout::{LayoutKey, HASH_SHIFT_TRIALS},
        test::MapSource,
        typesystem::PointerSize,
    };

    fn config() -> LayoutConfig {
        LayoutConfig::strict().with_pointer_size(PointerSize::Bit64)
    }

    #[test]
    fn test_no_layout_without_extension_data() {
        let source = MapSource::default();
        let layout = LayoutBuilder::new(&source, TypeHandle(1))
            .with_config(config())
            .build()
            .unwrap();
        assert!(layout.is_none());
    }

    #[test]
    fn test_no_layout_when_bases_have_none() {
        let source = MapSource::default();
        let layout = LayoutBuilder::new(&source, TypeHandle(2))
            .with_config(config())
            .bases(&[TypeHandle(1)])
            .build()
            .unwrap();
        assert!(layout.is_none());
    }

    #[test]
    fn test_root_type_layout() {
        let source = MapSource::default();
        let layout = LayoutBuilder::new(&source, TypeHandle(1))
            .with_config(config())
            .extension_size(16)
            .build()
            .unwrap()
            .unwrap();

        assert!(layout.is_ordered());
        assert_eq!(layout.order(), 0);
        assert_eq!(layout.entries().len(), 1);
        assert_eq!(layout.alloc_size(), 16);
        assert_eq!(layout.offset_of(&layout.key()), Some(-16));
    }

    #[test]
    fn test_requested_size_is_aligned() {
        let source = MapSource::default();
        let layout = LayoutBuilder::new(&source, TypeHandle(1))
            .with_config(config())
            .extension_size(5)
            .build()
            .unwrap()
            .unwrap();
        assert_eq!(layout.extension_size(), 8);
        assert_eq!(layout.alloc_size(), 8);
    }

    #[test]
    fn test_size_limit() {
        let source = MapSource::default();
        let result = LayoutBuilder::new(&source, TypeHandle(1))
            .with_config(config())
            .extension_size(config().max_extension_size + 1)
            .build();
        assert!(matches!(result, Err(Error::ExtensionSizeLimit { .. })));
    }

    #[test]
    fn test_preceding_regions() {
        let source = MapSource::default();
        let layout = LayoutBuilder::new(&source, TypeHandle(1))
            .with_config(config())
            .extension_size(16)
            .regions(RegionFlags::HAVE_GC | RegionFlags::MANAGED_DICT)
            .build()
            .unwrap()
            .unwrap();

        assert_eq!(layout.base_offset(), 24);
        assert_eq!(layout.alloc_size(), 16);
        assert_eq!(layout.offset_of(&layout.key()), Some(-40));
    }

    #[test]
    fn test_single_inheritance_chain_is_ordered() {
        let mut source = MapSource::default();
        let mut parent = None;
        for handle in 1..=5 {
            let bases: Vec<TypeHandle> = parent.into_iter().collect();
            let layout = LayoutBuilder::new(&source, TypeHandle(handle))
                .with_config(config())
                .bases(&bases)
                .extension_size(8)
                .build()
                .unwrap()
                .unwrap();
            assert!(layout.is_ordered());
            assert_eq!(layout.order(), handle - 1);
            source.insert(layout);
            parent = Some(TypeHandle(handle));
        }

        let leaf = source.layout_of(TypeHandle(5)).unwrap();
        assert_eq!(leaf.alloc_size(), 40);
        for handle in 1..=5 {
            let owner = source.layout_of(TypeHandle(handle)).unwrap();
            assert_eq!(
                leaf.offset_of(&owner.key()),
                Some(-8 * handle as i32),
                "owner {handle} should keep its inheritance position"
            );
        }
    }

    #[test]
    fn test_inherits_through_type_without_own_block() {
        let mut source = MapSource::default();
        let root = LayoutBuilder::new(&source, TypeHandle(1))
            .with_config(config())
            .extension_size(16)
            .build()
            .unwrap()
            .unwrap();
        source.insert(root.clone());

        let middle = LayoutBuilder::new(&source, TypeHandle(2))
            .with_config(config())
            .bases(&[TypeHandle(1)])
            .build()
            .unwrap()
            .unwrap();
        assert_eq!(middle.extension_size(), 0);
        assert_eq!(middle.owner_count(), 1);
        source.insert(middle.clone());

        let leaf = LayoutBuilder::new(&source, TypeHandle(3))
            .with_config(config())
            .bases(&[TypeHandle(2)])
            .extension_size(8)
            .build()
            .unwrap()
            .unwrap();

        assert!(leaf.is_ordered());
        assert_eq!(leaf.offset_of(&root.key()), Some(-16));
        assert_eq!(leaf.offset_of(&leaf.key()), Some(-24));
        // The middle type owns nothing, so it is never found
        assert_eq!(leaf.offset_of(&middle.key()), None);
    }

    #[test]
    fn test_diamond_falls_back_to_hashed() {
        let mut source = MapSource::default();
        let top = LayoutBuilder::new(&source, TypeHandle(1))
            .with_config(config())
            .extension_size(8)
            .id(0x1000)
            .build()
            .unwrap()
            .unwrap();
        source.insert(top.clone());

        let left = LayoutBuilder::new(&source, TypeHandle(2))
            .with_config(config())
            .bases(&[TypeHandle(1)])
            .extension_size(16)
            .id(0x2000)
            .build()
            .unwrap()
            .unwrap();
        source.insert(left.clone());

        let right = LayoutBuilder::new(&source, TypeHandle(3))
            .with_config(config())
            .bases(&[TypeHandle(1)])
            .extension_size(24)
            .id(0x3000)
            .build()
            .unwrap()
            .unwrap();
        source.insert(right.clone());

        assert_eq!(left.order(), right.order());

        let bottom = LayoutBuilder::new(&source, TypeHandle(4))
            .with_config(config())
            .bases(&[TypeHandle(2), TypeHandle(3)])
            .extension_size(8)
            .id(0x4000)
            .build()
            .unwrap()
            .unwrap();

        assert!(!bottom.is_ordered());
        // Top is reached twice but stored once
        assert_eq!(bottom.owner_count(), 4);
        assert_eq!(bottom.entries().len(), 8);
        assert_eq!(bottom.alloc_size(), 8 + 16 + 24 + 8);

        match bottom.strategy() {
            LayoutStrategy::Hashed {
                shift, max_probe, ..
            } => {
                assert!(*shift < HASH_SHIFT_TRIALS);
                assert!(*max_probe >= 1);
            }
            LayoutStrategy::Ordered { .. } => panic!("Expected hashed layout"),
        }

        for owner in [&top, &left, &right, &bottom] {
            assert!(bottom.offset_of(&owner.key()).is_some());
        }
        assert_eq!(bottom.offset_of(&top.key()), Some(-8));
        assert_eq!(bottom.offset_of(&left.key()), Some(-24));
        assert_eq!(bottom.offset_of(&right.key()), Some(-48));
        assert_eq!(bottom.offset_of(&bottom.key()), Some(-56));
    }

    #[test]
    fn test_missing_owner_layout_is_malformed() {
        let mut source = MapSource::default();
        let root = LayoutBuilder::new(&source, TypeHandle(1))
            .with_config(config())
            .extension_size(8)
            .build()
            .unwrap()
            .unwrap();
        source.insert(root);
        let child = LayoutBuilder::new(&source, TypeHandle(2))
            .with_config(config())
            .bases(&[TypeHandle(1)])
            .extension_size(8)
            .build()
            .unwrap()
            .unwrap();
        source.insert(child);
        source.remove(TypeHandle(1));

        let result = LayoutBuilder::new(&source, TypeHandle(3))
            .with_config(config())
            .bases(&[TypeHandle(2)])
            .build();
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_explicit_id_is_kept() {
        let source = MapSource::default();
        let layout = LayoutBuilder::new(&source, TypeHandle(1))
            .with_config(config())
            .extension_size(8)
            .id(0xCAFE)
            .build()
            .unwrap()
            .unwrap();
        assert_eq!(
            layout.key(),
            LayoutKey {
                handle: TypeHandle(1),
                order: 0,
                id: 0xCAFE
            }
        );
    }
}
