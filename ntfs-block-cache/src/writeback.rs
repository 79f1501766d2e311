//! Writeback engine: flushes a slot's dirty extent via the block device.

use block_device::BlockDevice;

use crate::error::CacheError;
use crate::fmt::warn_log as warn;
use crate::slot::PageSlot;

/// If `slot` has any dirty sectors, issues a single contiguous device write
/// covering `[dirty_first, dirty_last]` (inclusive) and clears the bitmap on
/// success.
///
/// On failure the slot is left exactly as it was: still dirty, with its
/// original bitmap intact, so a later `flush` or eviction can retry. Only a
/// successful writeback clears the bitmap.
pub(crate) fn flush_slot<D: BlockDevice>(
    device: &mut D,
    bytes_per_sector: u32,
    slot: &mut PageSlot,
) -> Result<(), CacheError> {
    let Some(first) = slot.dirty_first() else {
        return Ok(());
    };
    let last = slot.dirty_last().expect("dirty_first implies dirty_last");
    let base = slot.base_sector.expect("dirty slot cannot be FREE");

    let span_start = base + u64::from(first);
    let span_len = u64::from(last - first + 1);
    let byte_len = span_len as usize * bytes_per_sector as usize;
    let byte_off = first as usize * bytes_per_sector as usize;

    let ok = device.write_sectors(
        span_start,
        span_len,
        &slot.buffer.as_slice()[byte_off..byte_off + byte_len],
    );

    if !ok {
        warn!(
            "writeback failed: sectors [{}, {}), dirty bitmap preserved",
            span_start,
            span_start + span_len
        );
        return Err(CacheError::DeviceWrite);
    }

    slot.dirty = 0;
    Ok(())
}
