//! A page/sector block cache for sitting between an NTFS volume driver and a
//! [`block_device::BlockDevice`].
//!
//! The cache holds a fixed number of page-sized slots (each spanning
//! `sectors_per_page` contiguous device sectors), replaces them by strict
//! LRU with free-slot priority, tracks per-sector dirty state in a `u64`
//! bitmap, and elides device reads on writes that fully overwrite a page
//! (write-allocate). Aligned bulk transfers that land on whole, uncached
//! pages bypass the cache entirely.
//!
//! Every public cache operation returns `bool` (or `Option` where the
//! natural failure value is absent data rather than a boolean outcome)
//! instead of `Result`. [`Cache::last_error`] exposes a classified reason
//! for diagnostics without widening the public contract.
#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

#[cfg(feature = "std")]
extern crate std;

// MUST be the first module listed: everything below uses its macros.
mod fmt;

mod align;
mod cache;
mod error;
mod replacement;
mod slot;
mod tick;
mod writeback;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use block_device::BlockDevice;
pub use cache::{Cache, CacheStats};
pub use error::CacheError;
pub use slot::SlotState;
