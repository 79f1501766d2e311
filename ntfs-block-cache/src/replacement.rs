//! Strict-LRU replacement policy with mandatory free-slot priority.

use crate::slot::PageSlot;
use crate::tick::next_tick;

/// Outcome of a page-table lookup for a target sector.
pub(crate) enum Lookup {
    /// `sector` is already resident in slot `index`; `last_access` has
    /// already been stamped with a fresh tick.
    Hit(usize),
    /// No slot covers `sector`; `victim` is the slot to evict/populate.
    Miss { victim: usize },
}

/// Scans `slots` for one covering `sector`, returning a hit immediately, or
/// else the index of the slot the caller should evict: a FREE slot always
/// wins; otherwise the slot with the smallest `last_access`, ties broken by
/// the earliest index.
pub(crate) fn lookup(slots: &mut [PageSlot], sector: u64) -> Lookup {
    let mut victim = 0usize;
    let mut victim_tick = u32::MAX;
    let mut found_free = false;

    for (i, slot) in slots.iter_mut().enumerate() {
        if slot.covers(sector) {
            slot.last_access = next_tick();
            return Lookup::Hit(i);
        }
        if slot.is_free() {
            if !found_free {
                found_free = true;
                victim = i;
            }
        } else if !found_free && slot.last_access < victim_tick {
            victim_tick = slot.last_access;
            victim = i;
        }
    }

    Lookup::Miss { victim }
}

/// Among non-FREE slots whose range intersects `[start, start + len)`,
/// returns the index of the one with the smallest `base_sector`.
pub(crate) fn find_intersecting(slots: &[PageSlot], start: u64, len: u64) -> Option<usize> {
    slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.intersects(start, len))
        .min_by_key(|(_, slot)| slot.base_sector.expect("intersects implies non-FREE"))
        .map(|(i, _)| i)
}
