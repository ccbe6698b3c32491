//! Offset planning for extension blocks.
//!
//! Every owner receives a contiguous block directly in front of the previous one, starting
//! behind the opaque regions that precede the object. Owners are deduplicated before they
//! reach the planner, so a single linear sweep can never hand out overlapping ranges.

use crate::{typesystem::TypeHandle, Error, Result};

/// An owner of extension data as seen by one layout under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OwnerSlot {
    /// The type owning the block
    pub handle: TypeHandle,
    /// Size of the owned block in bytes
    pub size: usize,
    /// The owner's order index
    pub order: u32,
    /// The owner's hash key
    pub id: u32,
    /// Assigned offset relative to the object base, filled in by [`plan_offsets`]
    pub offset: i32,
}

impl OwnerSlot {
    pub(crate) fn new(handle: TypeHandle, size: usize, order: u32, id: u32) -> Self {
        OwnerSlot {
            handle,
            size,
            order,
            id,
            offset: 0,
        }
    }
}

/// Assign offsets to `owners` in sequence and return the accumulated extension size.
///
/// The first owner lands closest to the object: `offset = -(base + accumulated)`, where
/// `accumulated` already includes the owner's own size.
///
/// # Errors
/// Returns [`Error::LayoutOverflow`] if an offset does not fit the signed 32-bit range.
pub(crate) fn plan_offsets(base: usize, owners: &mut [OwnerSlot]) -> Result<usize> {
    let mut accumulated: usize = 0;
    for owner in owners.iter_mut() {
        accumulated = accumulated
            .checked_add(owner.size)
            .ok_or(Error::LayoutOverflow { size: usize::MAX })?;

        let distance = base
            .checked_add(accumulated)
            .ok_or(Error::LayoutOverflow { size: accumulated })?;
        let distance = i32::try_from(distance).map_err(|_| Error::LayoutOverflow {
            size: distance,
        })?;

        owner.offset = -distance;
    }

    Ok(accumulated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_single_owner() {
        let mut owners = [OwnerSlot::new(TypeHandle(1), 16, 0, 0)];
        let alloc = plan_offsets(0, &mut owners).unwrap();

        assert_eq!(alloc, 16);
        assert_eq!(owners[0].offset, -16);
    }

    #[test]
    fn test_plan_accumulates_in_order() {
        let mut owners = [
            OwnerSlot::new(TypeHandle(1), 16, 0, 0),
            OwnerSlot::new(TypeHandle(2), 8, 1, 0),
            OwnerSlot::new(TypeHandle(3), 32, 2, 0),
        ];
        let alloc = plan_offsets(0, &mut owners).unwrap();

        assert_eq!(alloc, 56);
        assert_eq!(owners[0].offset, -16);
        assert_eq!(owners[1].offset, -24);
        assert_eq!(owners[2].offset, -56);
    }

    #[test]
    fn test_plan_skips_preceding_regions() {
        let mut owners = [
            OwnerSlot::new(TypeHandle(1), 16, 0, 0),
            OwnerSlot::new(TypeHandle(2), 8, 1, 0),
        ];
        let alloc = plan_offsets(24, &mut owners).unwrap();

        // The preceding regions are not part of the extension memory
        assert_eq!(alloc, 24);
        assert_eq!(owners[0].offset, -40);
        assert_eq!(owners[1].offset, -48);
    }

    #[test]
    fn test_plan_empty() {
        let alloc = plan_offsets(16, &mut []).unwrap();
        assert_eq!(alloc, 0);
    }

    #[test]
    fn test_plan_overflow() {
        let mut owners = [
            OwnerSlot::new(TypeHandle(1), i32::MAX as usize, 0, 0),
            OwnerSlot::new(TypeHandle(2), 8, 1, 0),
        ];
        let result = plan_offsets(0, &mut owners);
        assert!(matches!(result, Err(Error::LayoutOverflow { .. })));
    }
}
