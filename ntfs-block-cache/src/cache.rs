//! The access layer: the public `Cache` type built atop the page table,
//! replacement policy, and writeback engine.

extern crate alloc;

use alloc::vec::Vec;

use block_device::{BlockDevice, is_aligned};

use crate::align::MIN_ALIGN;
use crate::error::CacheError;
use crate::fmt::warn_log as warn;
use crate::replacement::{self, Lookup};
use crate::slot::{PageSlot, SlotState};
use crate::tick::next_tick;
use crate::writeback;

const MIN_PAGE_COUNT: u32 = 4;
const MIN_SECTORS_PER_PAGE: u32 = 32;
const MAX_SECTORS_PER_PAGE: u32 = 64;

/// Cumulative, read-only counters for cache observability.
///
/// Pure bookkeeping: nothing in the cache's control flow reads these back.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Accesses satisfied without a device read.
    pub hits: u32,
    /// Accesses that required populating a slot.
    pub misses: u32,
    /// Misses that replaced a previously valid (non-FREE) slot.
    pub evictions: u32,
    /// Successful contiguous writebacks (from eviction or `flush`).
    pub writebacks: u32,
    /// Bulk transfers that bypassed the cache entirely.
    pub bypass_transfers: u32,
}

/// A sector/page block cache sitting between an NTFS volume driver and a
/// [`BlockDevice`].
///
/// See the crate-level documentation for the replacement, writeback, and
/// bypass policies this implements. Every public operation returns `bool`
/// (or `Option` for the constructor and little-endian read) rather than
/// `Result`: see [`Cache::last_error`] for a classified reason behind the
/// most recent `false`.
pub struct Cache<D: BlockDevice> {
    device: D,
    slots: Vec<PageSlot>,
    end_of_partition: u64,
    sectors_per_page: u32,
    bytes_per_sector: u32,
    stats: CacheStats,
    last_error: Option<CacheError>,
}

impl<D: BlockDevice> Cache<D> {
    /// Constructs a cache.
    ///
    /// `page_count` is clamped up to at least 4 slots; `sectors_per_page` is
    /// clamped into `[32, 64]`. Returns `None` if `page_count == 0` or
    /// `sectors_per_page == 0` *before* clamping, or if a slot buffer could
    /// not be allocated.
    pub fn new(
        page_count: u32,
        sectors_per_page: u32,
        device: D,
        end_of_partition: u64,
        bytes_per_sector: u32,
    ) -> Option<Self> {
        if page_count == 0 || sectors_per_page == 0 {
            return None;
        }
        let page_count = page_count.max(MIN_PAGE_COUNT);
        let sectors_per_page = sectors_per_page.clamp(MIN_SECTORS_PER_PAGE, MAX_SECTORS_PER_PAGE);
        let page_bytes = sectors_per_page as usize * bytes_per_sector as usize;

        let mut slots = Vec::new();
        slots.try_reserve(page_count as usize).ok()?;
        for _ in 0..page_count {
            slots.push(PageSlot::new(page_bytes)?);
        }

        Some(Self {
            device,
            slots,
            end_of_partition,
            sectors_per_page,
            bytes_per_sector,
            stats: CacheStats::default(),
            last_error: None,
        })
    }

    /// A snapshot of cumulative hit/miss/eviction/writeback counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// The classified reason behind the most recent `false` return, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<CacheError> {
        self.last_error
    }

    /// A derived FREE/CLEAN/DIRTY snapshot of every slot, in slot order.
    #[must_use]
    pub fn slot_states(&self) -> Vec<SlotState> {
        self.slots.iter().map(PageSlot::state).collect()
    }

    fn writeback_if_dirty(
        device: &mut D,
        bytes_per_sector: u32,
        stats: &mut CacheStats,
        slot: &mut PageSlot,
    ) -> Result<(), CacheError> {
        let was_dirty = slot.is_dirty();
        writeback::flush_slot(device, bytes_per_sector, slot)?;
        if was_dirty {
            stats.writebacks += 1;
        }
        Ok(())
    }

    /// Evicts/populates `victim` for an access at `target`. `write` selects
    /// the write-allocate optimisation; `num_sectors` is only meaningful
    /// when `write` is set (how many sectors the caller intends to write
    /// starting at `target`).
    fn populate(&mut self, victim: usize, target: u64, write: bool, num_sectors: u64) -> bool {
        let was_free = self.slots[victim].is_free();

        if Self::writeback_if_dirty(
            &mut self.device,
            self.bytes_per_sector,
            &mut self.stats,
            &mut self.slots[victim],
        )
        .is_err()
        {
            self.last_error = Some(CacheError::DeviceWrite);
            return false;
        }

        let s = u64::from(self.sectors_per_page);
        let base = (target / s) * s;
        let count = core::cmp::min(s, self.end_of_partition.saturating_sub(base)) as u32;
        let local = (target - base) as u32;

        let (read_lo, read_hi): (u32, u32) = if write {
            let n = core::cmp::min(num_sectors, u64::from(count - local)) as u32;
            if local == 0 && n == count {
                // Fully overwritten: elide the load entirely.
                self.finish_populate(victim, base, count, was_free);
                return true;
            } else if local == 0 {
                (n, count)
            } else if local + n == count {
                (0, local)
            } else {
                (0, count)
            }
        } else {
            (0, count)
        };

        if read_hi > read_lo {
            let read_start = base + u64::from(read_lo);
            let read_count = u64::from(read_hi - read_lo);
            let byte_off = read_lo as usize * self.bytes_per_sector as usize;
            let byte_len = (read_hi - read_lo) as usize * self.bytes_per_sector as usize;

            let slot = &mut self.slots[victim];
            let ok = self.device.read_sectors(
                read_start,
                read_count,
                &mut slot.buffer.as_mut_slice()[byte_off..byte_off + byte_len],
            );
            if !ok {
                warn!("populate read failed: sectors [{}, {})", read_start, read_start + read_count);
                self.slots[victim].reset_to_free();
                self.last_error = Some(CacheError::DeviceRead);
                return false;
            }
        }

        self.finish_populate(victim, base, count, was_free);
        true
    }

    fn finish_populate(&mut self, victim: usize, base: u64, count: u32, was_free: bool) {
        let slot = &mut self.slots[victim];
        slot.base_sector = Some(base);
        slot.count = count;
        slot.dirty = 0;
        slot.last_access = next_tick();
        self.stats.misses += 1;
        if !was_free {
            self.stats.evictions += 1;
        }
    }

    /// Resolves `target` to a resident slot index, populating on a miss.
    /// Returns `None` (and leaves `last_error` set) on populate failure.
    fn resolve(&mut self, target: u64, write: bool, num_sectors: u64) -> Option<usize> {
        match replacement::lookup(&mut self.slots, target) {
            Lookup::Hit(idx) => {
                self.stats.hits += 1;
                Some(idx)
            }
            Lookup::Miss { victim } => self.populate(victim, target, write, num_sectors).then_some(victim),
        }
    }

    /// Sectors that may bypass the cache starting at page-aligned `t`, given
    /// `n` sectors remain to transfer. Identical rule for reads and writes.
    fn bypass_len(&self, t: u64, n: u64) -> u64 {
        match replacement::find_intersecting(&self.slots, t, n) {
            None => (n / u64::from(self.sectors_per_page)) * u64::from(self.sectors_per_page),
            Some(idx) => {
                let base = self.slots[idx].base_sector.expect("find_intersecting implies non-FREE");
                if base > t { base - t } else { 0 }
            }
        }
    }

    /// Reads `n` sectors starting at `t` into `dst`.
    pub fn read_sectors(&mut self, mut t: u64, mut n: u64, dst: &mut [u8]) -> bool {
        let mut off = 0usize;
        while n > 0 {
            if is_aligned(dst[off..].as_ptr(), MIN_ALIGN) && t % u64::from(self.sectors_per_page) == 0 {
                let m = self.bypass_len(t, n);
                if m > 0 {
                    let byte_len = m as usize * self.bytes_per_sector as usize;
                    if !self.device.read_sectors(t, m, &mut dst[off..off + byte_len]) {
                        warn!("bypass read failed: sectors [{}, {})", t, t + m);
                        self.last_error = Some(CacheError::DeviceRead);
                        return false;
                    }
                    self.stats.bypass_transfers += 1;
                    t += m;
                    n -= m;
                    off += byte_len;
                    continue;
                }
            }

            let Some(idx) = self.resolve(t, false, 0) else {
                return false;
            };
            let slot = &self.slots[idx];
            let base = slot.base_sector.expect("resolved slot cannot be FREE");
            let local = t - base;
            let avail = u64::from(slot.count) - local;
            let take = core::cmp::min(n, avail);
            let byte_off = local as usize * self.bytes_per_sector as usize;
            let byte_len = take as usize * self.bytes_per_sector as usize;
            dst[off..off + byte_len].copy_from_slice(&slot.buffer.as_slice()[byte_off..byte_off + byte_len]);

            t += take;
            n -= take;
            off += byte_len;
        }
        true
    }

    /// Writes `n` sectors starting at `t` from `src`.
    pub fn write_sectors(&mut self, mut t: u64, mut n: u64, src: &[u8]) -> bool {
        let mut off = 0usize;
        while n > 0 {
            if is_aligned(src[off..].as_ptr(), MIN_ALIGN) && t % u64::from(self.sectors_per_page) == 0 {
                let m = self.bypass_len(t, n);
                if m > 0 {
                    let byte_len = m as usize * self.bytes_per_sector as usize;
                    if !self.device.write_sectors(t, m, &src[off..off + byte_len]) {
                        warn!("bypass write failed: sectors [{}, {})", t, t + m);
                        self.last_error = Some(CacheError::DeviceWrite);
                        return false;
                    }
                    self.stats.bypass_transfers += 1;
                    t += m;
                    n -= m;
                    off += byte_len;
                    continue;
                }
            }

            let Some(idx) = self.resolve(t, true, n) else {
                return false;
            };
            let slot = &mut self.slots[idx];
            let base = slot.base_sector.expect("resolved slot cannot be FREE");
            let local = (t - base) as u32;
            let avail = slot.count - local;
            let written = core::cmp::min(n, u64::from(avail)) as u32;
            let byte_off = local as usize * self.bytes_per_sector as usize;
            let byte_len = written as usize * self.bytes_per_sector as usize;
            slot.buffer.as_mut_slice()[byte_off..byte_off + byte_len]
                .copy_from_slice(&src[off..off + byte_len]);
            slot.dirty |= dirty_mask(written) << local;

            t += u64::from(written);
            n -= u64::from(written);
            off += byte_len;
        }
        true
    }

    /// Reads `size` bytes at `offset` within the sector containing `t` into `dst`.
    ///
    /// Requires `offset + size <= bytes_per_sector`.
    pub fn read_partial(&mut self, dst: &mut [u8], t: u64, offset: u32, size: u32) -> bool {
        if !self.check_partial_bounds(offset, size) {
            return false;
        }
        let Some(idx) = self.resolve(t, false, 0) else {
            return false;
        };
        let slot = &self.slots[idx];
        let base = slot.base_sector.expect("resolved slot cannot be FREE");
        let local = (t - base) as usize;
        let byte_off = local * self.bytes_per_sector as usize + offset as usize;
        dst[..size as usize].copy_from_slice(&slot.buffer.as_slice()[byte_off..byte_off + size as usize]);
        true
    }

    /// Writes `size` bytes at `offset` within the sector containing `t` from `src`.
    ///
    /// The page must be pulled in fully valid (the bytes around `offset` are
    /// preserved), so this always goes through the non-write-allocate path.
    pub fn write_partial(&mut self, src: &[u8], t: u64, offset: u32, size: u32) -> bool {
        if !self.check_partial_bounds(offset, size) {
            return false;
        }
        let Some(idx) = self.resolve(t, false, 0) else {
            return false;
        };
        let slot = &mut self.slots[idx];
        let base = slot.base_sector.expect("resolved slot cannot be FREE");
        let local = (t - base) as u32;
        let byte_off = local as usize * self.bytes_per_sector as usize + offset as usize;
        slot.buffer.as_mut_slice()[byte_off..byte_off + size as usize].copy_from_slice(&src[..size as usize]);
        slot.dirty |= 1u64 << local;
        true
    }

    /// Overwrites the whole sector containing `t` with zeroes, then writes
    /// `size` bytes at `offset` from `src`.
    ///
    /// The sector about to be fully overwritten is never pre-loaded from the
    /// device (write-allocate with a single-sector write request).
    pub fn erase_write_partial(&mut self, src: &[u8], t: u64, offset: u32, size: u32) -> bool {
        if !self.check_partial_bounds(offset, size) {
            return false;
        }
        let Some(idx) = self.resolve(t, true, 1) else {
            return false;
        };
        let slot = &mut self.slots[idx];
        let base = slot.base_sector.expect("resolved slot cannot be FREE");
        let local = (t - base) as u32;
        let sector_off = local as usize * self.bytes_per_sector as usize;
        let sector_end = sector_off + self.bytes_per_sector as usize;
        slot.buffer.as_mut_slice()[sector_off..sector_end].fill(0);
        slot.buffer.as_mut_slice()[sector_off + offset as usize..sector_off + offset as usize + size as usize]
            .copy_from_slice(&src[..size as usize]);
        slot.dirty |= 1u64 << local;
        true
    }

    fn check_partial_bounds(&mut self, offset: u32, size: u32) -> bool {
        let in_bounds = matches!(offset.checked_add(size), Some(end) if end <= self.bytes_per_sector);
        if !in_bounds {
            warn!("partial access offset={} size={} exceeds sector size {}", offset, size, self.bytes_per_sector);
            self.last_error = Some(CacheError::InvalidPartial);
            return false;
        }
        true
    }

    /// Reads a little-endian integer of `width` bytes (1, 2, or 4) at
    /// `offset` within the sector containing `t`.
    pub fn read_le(&mut self, t: u64, offset: u32, width: u32) -> Option<u32> {
        if !matches!(width, 1 | 2 | 4) {
            warn!("invalid little-endian width {}", width);
            self.last_error = Some(CacheError::InvalidLeWidth);
            return None;
        }
        let mut buf = [0u8; 4];
        if !self.read_partial(&mut buf[..width as usize], t, offset, width) {
            return None;
        }
        Some(match width {
            1 => u32::from(buf[0]),
            2 => u32::from(u16::from_le_bytes([buf[0], buf[1]])),
            4 => u32::from_le_bytes(buf),
            _ => unreachable!("validated above"),
        })
    }

    /// Writes `value`'s low `width` bytes (1, 2, or 4) in little-endian order
    /// at `offset` within the sector containing `t`.
    pub fn write_le(&mut self, t: u64, offset: u32, width: u32, value: u32) -> bool {
        if !matches!(width, 1 | 2 | 4) {
            warn!("invalid little-endian width {}", width);
            self.last_error = Some(CacheError::InvalidLeWidth);
            return false;
        }
        let bytes = value.to_le_bytes();
        self.write_partial(&bytes[..width as usize], t, offset, width)
    }

    /// Writes back every dirty slot. Returns `false` on the first device
    /// write that fails; slots flushed before the failure stay clean, the
    /// rest (including the one that failed) stay dirty.
    pub fn flush(&mut self) -> bool {
        for slot in self.slots.iter_mut() {
            if let Err(e) = Self::writeback_if_dirty(&mut self.device, self.bytes_per_sector, &mut self.stats, slot) {
                self.last_error = Some(e);
                return false;
            }
        }
        true
    }

    /// Flushes, then resets every slot to FREE. Buffers are retained.
    pub fn invalidate(&mut self) -> bool {
        if !self.flush() {
            return false;
        }
        for slot in self.slots.iter_mut() {
            slot.reset_to_free();
        }
        true
    }
}

impl<D: BlockDevice> Drop for Cache<D> {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// `((1 << width) - 1)`, without overflow at `width == 64`.
#[inline]
fn dirty_mask(width: u32) -> u64 {
    if width >= 64 { u64::MAX } else { (1u64 << width) - 1 }
}
