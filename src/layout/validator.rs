//! # Layout Validation
//!
//! Post-construction checks for [`Layout`]s. The builder runs them before a layout is bound
//! to its type when [`crate::LayoutConfig::validate_layouts`] is set; they can also be run
//! against any finalized layout through [`LayoutValidator::validate`].
//!
//! ## Checks
//!
//! - **Offsets**: every block lies in front of the preceding regions, entirely inside the
//!   reserved extension memory
//! - **Overlap**: no two owners share a byte
//! - **Size**: the owners' sizes add up to the layout's `alloc_size`
//! - **Table shape**: ordered tables have `order + 1` slots, hashed tables twice the owners
//! - **Reachability**: every owner is found by the layout's own lookup strategy
//!
//! ## Thread Safety
//!
//! The `LayoutValidator` is stateless and safe for concurrent use across multiple threads.

use crate::{
    layout::{
        hashed, planner::OwnerSlot, Layout, LayoutKey, LayoutSource, LayoutStrategy,
    },
    Result,
};

/// Invariant checker for built layouts.
pub struct LayoutValidator;

impl LayoutValidator {
    /// Validate a finalized layout, reading owner sizes and keys from `source`.
    ///
    /// # Arguments
    ///
    /// * `layout` - The layout to check
    /// * `source` - Lookup of the layouts of every owner recorded in `layout`
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] describing the first violated invariant, or if
    /// an owner recorded in the layout cannot be found in `source`.
    pub fn validate<S: LayoutSource + ?Sized>(layout: &Layout, source: &S) -> Result<()> {
        let mut owners = Vec::with_capacity(layout.owner_count());
        for (handle, offset) in layout.owners() {
            let (size, key) = if handle == layout.owner() {
                (layout.extension_size(), layout.key())
            } else {
                let owner_layout = source.layout_of(handle).ok_or_else(|| {
                    malformed_error!("Owner {} of {} has no layout", handle, layout.owner())
                })?;
                (owner_layout.extension_size(), owner_layout.key())
            };

            owners.push(OwnerSlot {
                handle,
                size,
                order: key.order,
                id: key.id,
                offset,
            });
        }

        Self::validate_owners(layout, &owners)
    }

    /// Validate `layout` against the owner set it was planned from.
    pub(crate) fn validate_owners(layout: &Layout, owners: &[OwnerSlot]) -> Result<()> {
        Self::validate_shape(layout, owners.len())?;
        Self::validate_offsets(layout, owners)?;
        Self::validate_reachability(layout, owners)
    }

    fn validate_shape(layout: &Layout, owner_count: usize) -> Result<()> {
        let expected = match layout.strategy() {
            LayoutStrategy::Ordered { .. } => layout.order() as usize + 1,
            LayoutStrategy::Hashed { max_probe, .. } => {
                if owner_count > 0 && (*max_probe == 0 || *max_probe as usize > owner_count) {
                    return Err(malformed_error!(
                        "Hashed layout of {} has max probe {} for {} owners",
                        layout.owner(),
                        max_probe,
                        owner_count
                    ));
                }
                hashed::table_size(owner_count)
            }
        };

        if layout.entries().len() != expected {
            return Err(malformed_error!(
                "Layout of {} has {} entries, expected {}",
                layout.owner(),
                layout.entries().len(),
                expected
            ));
        }

        if layout.owner_count() != owner_count {
            return Err(malformed_error!(
                "Layout of {} records {} owners, expected {}",
                layout.owner(),
                layout.owner_count(),
                owner_count
            ));
        }

        Ok(())
    }

    fn validate_offsets(layout: &Layout, owners: &[OwnerSlot]) -> Result<()> {
        let base = layout.base_offset() as i64;
        let lowest = -(base + layout.alloc_size() as i64);

        let mut ranges: Vec<(i64, i64)> = Vec::with_capacity(owners.len());
        let mut total = 0usize;
        for owner in owners {
            let start = i64::from(owner.offset);
            let end = start + owner.size as i64;
            if start < lowest || end > -base {
                return Err(malformed_error!(
                    "Block of {} at [{}, {}) lies outside the extension memory [{}, {})",
                    owner.handle,
                    start,
                    end,
                    lowest,
                    -base
                ));
            }
            ranges.push((start, end));
            total += owner.size;
        }

        if total != layout.alloc_size() {
            return Err(malformed_error!(
                "Owners of {} add up to {} bytes, alloc size is {}",
                layout.owner(),
                total,
                layout.alloc_size()
            ));
        }

        ranges.sort_unstable();
        for pair in ranges.windows(2) {
            if pair[0].1 > pair[1].0 {
                return Err(malformed_error!(
                    "Blocks [{}, {}) and [{}, {}) overlap in layout of {}",
                    pair[0].0,
                    pair[0].1,
                    pair[1].0,
                    pair[1].1,
                    layout.owner()
                ));
            }
        }

        Ok(())
    }

    fn validate_reachability(layout: &Layout, owners: &[OwnerSlot]) -> Result<()> {
        for owner in owners {
            let key = LayoutKey {
                handle: owner.handle,
                order: owner.order,
                id: owner.id,
            };
            if layout.offset_of(&key) != Some(owner.offset) {
                return Err(malformed_error!(
                    "Owner {} is not reachable in layout of {}",
                    owner.handle,
                    layout.owner()
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        layout::{LayoutBuilder, LayoutEntry},
        test::MapSource,
        typesystem::TypeHandle,
        Error, LayoutConfig,
    };

    fn layout(strategy: LayoutStrategy, order: u32, alloc_size: usize) -> Layout {
        Layout {
            owner: TypeHandle(2),
            extension_size: 8,
            alloc_size,
            base_offset: 0,
            order,
            id: 2,
            strategy,
        }
    }

    fn owners() -> Vec<OwnerSlot> {
        vec![
            OwnerSlot {
                offset: -16,
                ..OwnerSlot::new(TypeHandle(1), 16, 0, 1)
            },
            OwnerSlot {
                offset: -24,
                ..OwnerSlot::new(TypeHandle(2), 8, 1, 2)
            },
        ]
    }

    fn entries(offsets: [i32; 2]) -> Box<[LayoutEntry]> {
        vec![
            LayoutEntry {
                owner: Some(TypeHandle(1)),
                offset: offsets[0],
            },
            LayoutEntry {
                owner: Some(TypeHandle(2)),
                offset: offsets[1],
            },
        ]
        .into_boxed_slice()
    }

    #[test]
    fn test_valid_ordered_layout() {
        let layout = layout(
            LayoutStrategy::Ordered {
                entries: entries([-16, -24]),
            },
            1,
            24,
        );
        assert!(LayoutValidator::validate_owners(&layout, &owners()).is_ok());
    }

    #[test]
    fn test_overlap_detected() {
        let mut owners = owners();
        owners[1].offset = -20;
        let layout = layout(
            LayoutStrategy::Ordered {
                entries: entries([-16, -20]),
            },
            1,
            24,
        );
        let result = LayoutValidator::validate_owners(&layout, &owners);
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_positive_offset_detected() {
        let mut owners = owners();
        owners[0].offset = 0;
        let layout = layout(
            LayoutStrategy::Ordered {
                entries: entries([0, -24]),
            },
            1,
            24,
        );
        let result = LayoutValidator::validate_owners(&layout, &owners);
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_size_mismatch_detected() {
        let layout = layout(
            LayoutStrategy::Ordered {
                entries: entries([-16, -24]),
            },
            1,
            32,
        );
        let result = LayoutValidator::validate_owners(&layout, &owners());
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_wrong_table_shape_detected() {
        let layout = layout(
            LayoutStrategy::Hashed {
                entries: entries([-16, -24]),
                shift: 0,
                max_probe: 1,
            },
            1,
            24,
        );
        let result = LayoutValidator::validate_owners(&layout, &owners());
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_validate_through_source() {
        let mut source = MapSource::default();
        let config = LayoutConfig::minimal();
        let base = LayoutBuilder::new(&source, TypeHandle(1))
            .with_config(config)
            .extension_size(16)
            .build()
            .unwrap()
            .unwrap();
        source.insert(base);
        let derived = LayoutBuilder::new(&source, TypeHandle(2))
            .with_config(config)
            .bases(&[TypeHandle(1)])
            .extension_size(8)
            .build()
            .unwrap()
            .unwrap();

        assert!(LayoutValidator::validate(&derived, &source).is_ok());

        source.remove(TypeHandle(1));
        let result = LayoutValidator::validate(&derived, &source);
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }
}
