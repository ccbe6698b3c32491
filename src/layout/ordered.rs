//! Direct indexed lookup for collision-free hierarchies.

use crate::{
    layout::{alloc_entries, planner::OwnerSlot, try_alloc, LayoutEntry, LayoutKey},
    Result,
};

/// Check that every inherited owner occupies a distinct order index below the owner count.
///
/// This always holds under single inheritance, where each new type takes the next free
/// index. Independently ordered bases combined through multiple inheritance collide.
///
/// # Errors
/// Returns [`crate::Error::LayoutAllocation`] if the scratch bitmap cannot be reserved.
pub(crate) fn is_collision_free(ancestors: &[OwnerSlot]) -> Result<bool> {
    let mut seen = try_alloc(ancestors.len(), false)?;
    for owner in ancestors {
        let Ok(index) = usize::try_from(owner.order) else {
            return Ok(false);
        };
        match seen.get_mut(index) {
            Some(slot) if !*slot => *slot = true,
            _ => return Ok(false),
        }
    }
    Ok(true)
}

/// Build an `order + 1` slot table with every owner at its own order index.
///
/// ## Arguments
/// * `order` - The order assigned to the type the table is built for
/// * `owners` - All owners with planned offsets
///
/// # Errors
/// Returns [`crate::Error::LayoutAllocation`] if the table cannot be reserved.
pub(crate) fn build_table(order: u32, owners: &[OwnerSlot]) -> Result<Box<[LayoutEntry]>> {
    let mut entries = alloc_entries(order as usize + 1)?;
    for owner in owners {
        let Some(entry) = entries.get_mut(owner.order as usize) else {
            return Err(malformed_error!(
                "Owner {} has order {} outside of a table with {} entries",
                owner.handle,
                owner.order,
                order as usize + 1
            ));
        };
        *entry = LayoutEntry {
            owner: Some(owner.handle),
            offset: owner.offset,
        };
    }
    Ok(entries.into_boxed_slice())
}

/// Look up `target` by its order index.
///
/// A single bounds check and identity comparison, independent of the hierarchy depth.
pub(crate) fn resolve(entries: &[LayoutEntry], target: &LayoutKey) -> Option<i32> {
    let entry = entries.get(target.order as usize)?;
    if entry.owner != Some(target.handle) {
        return None;
    }
    Some(entry.offset)
}
