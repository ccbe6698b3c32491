//! Open-addressed lookup for hierarchies whose order indices collide.
//!
//! Multiple and diamond inheritance combine base layouts that were ordered independently,
//! so direct indexing is no longer possible. The table is sized at twice the owner count to
//! keep the load factor at or below one half, and the id shift is picked once per layout by
//! simulating every candidate and keeping the cheapest.
//!
//! The search is best-effort: if none of the [`HASH_SHIFT_TRIALS`] candidates places every
//! owner without collisions, the cheapest one is adopted and lookups probe up to the worst
//! observed distance.

use crate::{
    layout::{alloc_entries, planner::OwnerSlot, try_alloc, LayoutEntry, LayoutKey},
    Result,
};

/// Number of shift candidates tried when building a hashed table
pub const HASH_SHIFT_TRIALS: u32 = 16;

/// A populated hash table together with its lookup parameters
#[derive(Debug)]
pub(crate) struct HashTable {
    pub entries: Box<[LayoutEntry]>,
    pub shift: u32,
    pub max_probe: u32,
}

/// Number of slots for a table holding `owner_count` owners
pub(crate) fn table_size(owner_count: usize) -> usize {
    owner_count.saturating_mul(2)
}

#[inline]
fn ideal_slot(id: u32, shift: u32, size: usize) -> usize {
    (id >> shift) as usize % size
}

/// Simulate placing `ids` in insertion order and return the total probe cost.
///
/// Each insertion costs one plus the number of occupied slots it had to skip.
fn placement_cost(ids: &[u32], shift: u32, occupied: &mut [bool]) -> usize {
    occupied.fill(false);
    let size = occupied.len();

    let mut total = 0;
    for &id in ids {
        let mut position = ideal_slot(id, shift, size);
        let mut cost = 1;
        while occupied[position] {
            cost += 1;
            position += 1;
            if position == size {
                position = 0;
            }
        }
        occupied[position] = true;
        total += cost;
    }
    total
}

/// Pick the shift with the lowest total probe cost for `ids` in a table of `size` slots.
///
/// Stops at the first perfect placement. Ties keep the earlier shift.
///
/// # Errors
/// Returns [`crate::Error::LayoutAllocation`] if the scratch occupancy map cannot be reserved.
pub(crate) fn search_shift(ids: &[u32], size: usize) -> Result<u32> {
    if size == 0 || ids.is_empty() {
        return Ok(0);
    }

    let mut occupied = try_alloc(size, false)?;
    let mut best = 0;
    let mut best_cost = usize::MAX;

    for shift in 0..HASH_SHIFT_TRIALS {
        let cost = placement_cost(ids, shift, &mut occupied);
        log::trace!("hash shift {shift}: total probe cost {cost} for {} ids", ids.len());

        if cost == ids.len() {
            return Ok(shift);
        }
        if cost < best_cost {
            best_cost = cost;
            best = shift;
        }
    }

    log::warn!(
        "no collision-free hash shift for {} owners, adopting shift {best} with cost {best_cost}",
        ids.len()
    );
    Ok(best)
}

/// Build the hash table for `owners`, inserted in the given order.
///
/// The shift search and the final insertion use the same order, so the recorded
/// `max_probe` matches what the search simulated.
///
/// # Errors
/// Returns [`crate::Error::LayoutAllocation`] if the table cannot be reserved.
pub(crate) fn build_hash_table(owners: &[OwnerSlot]) -> Result<HashTable> {
    let size = table_size(owners.len());
    let mut entries = alloc_entries(size)?;
    if size == 0 {
        return Ok(HashTable {
            entries: entries.into_boxed_slice(),
            shift: 0,
            max_probe: 0,
        });
    }

    let mut ids = try_alloc(owners.len(), 0u32)?;
    for (id, owner) in ids.iter_mut().zip(owners) {
        *id = owner.id;
    }
    let shift = search_shift(&ids, size)?;

    let mut max_probe = 1;
    for owner in owners {
        let mut position = ideal_slot(owner.id, shift, size);
        let mut cost = 1;
        while entries[position].owner.is_some() {
            cost += 1;
            position += 1;
            if position == size {
                position = 0;
            }
        }
        max_probe = max_probe.max(cost);

        entries[position] = LayoutEntry {
            owner: Some(owner.handle),
            offset: owner.offset,
        };
    }

    Ok(HashTable {
        entries: entries.into_boxed_slice(),
        shift,
        max_probe,
    })
}

/// Look up `target` by its id, probing at most `max_probe` slots.
pub(crate) fn resolve(
    entries: &[LayoutEntry],
    shift: u32,
    max_probe: u32,
    target: &LayoutKey,
) -> Option<i32> {
    let size = entries.len();
    if size == 0 {
        return None;
    }

    let mut position = ideal_slot(target.id, shift, size);
    for _ in 0..max_probe {
        let entry = &entries[position];
        if entry.owner == Some(target.handle) {
            return Some(entry.offset);
        }
        position += 1;
        if position == size {
            position = 0;
        }
    }
    None
}
