//! Internal diagnostic classification for the cache's boolean failure paths.
//!
//! The public API returns plain `bool` (see the crate root docs for why);
//! `CacheError` never crosses that boundary as a `Result`. It exists purely
//! so the logging macros in [`crate::fmt`] and [`crate::Cache::last_error`]
//! have a stable, matchable reason for the most recent `false`.

use core::fmt;

/// Why the most recent cache operation returned `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CacheError {
    /// The block device failed a `read_sectors` call.
    DeviceRead,
    /// The block device failed a `write_sectors` call.
    DeviceWrite,
    /// A partial-sector operation violated `offset + size <= bytes_per_sector`.
    InvalidPartial,
    /// `read_le`/`write_le` was called with a width other than 1, 2 or 4.
    InvalidLeWidth,
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::DeviceRead => "block device read failed",
            Self::DeviceWrite => "block device write failed",
            Self::InvalidPartial => "partial-sector offset + size exceeds sector size",
            Self::InvalidLeWidth => "little-endian width must be 1, 2, or 4",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for CacheError {}
