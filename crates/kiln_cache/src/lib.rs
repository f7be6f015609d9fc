//! The keyed asset-future cache.
//!
//! [`AssetCache`] deduplicates concurrent requests for the same logical
//! asset: one future per 64-bit key, replaced in place when its validation
//! token reports staleness. A parallel shadow table holds live-edit
//! overrides that always win over the primary table. [`CacheSet`] groups
//! per-type caches behind one context object for diagnostics and global
//! reset.

#![warn(missing_docs)]

pub mod cache;
pub mod record;
pub mod set;

pub use cache::AssetCache;
pub use record::CacheRecord;
pub use set::CacheSet;
