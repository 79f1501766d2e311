//! Process-wide LRU access counter.
//!
//! The tick is shared by every [`crate::Cache`] in the process rather than
//! kept per-instance, so ordering stays comparable even when more than one
//! cache is constructed. `portable_atomic` is used instead of
//! `core::sync::atomic` so this still works on targets without native
//! 32-bit atomics.

use portable_atomic::{AtomicU32, Ordering};

static TICK: AtomicU32 = AtomicU32::new(0);

/// Returns the next monotonically increasing tick value.
///
/// Wraps after `u32::MAX` touches; harmless for LRU ordering since only the
/// relative order of ticks within a cache's own working set matters.
#[inline]
pub(crate) fn next_tick() -> u32 {
    TICK.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_strictly_increase_within_a_run() {
        let a = next_tick();
        let b = next_tick();
        assert!(b > a);
    }
}
