//! Diagnostic records describing cache contents.

use kiln_common::{AssetKey, Blob};
use kiln_future::AssetState;

/// A snapshot of one tracked cache entry, for hot-reload overlays and
/// debugging tools. An in-memory list, not a wire format.
#[derive(Debug, Clone)]
pub struct CacheRecord {
    /// Human-readable initializer the entry was requested with.
    pub initializer: String,

    /// Background state at snapshot time.
    pub state: AssetState,

    /// Validation index of the entry's background token (0 = fresh or no
    /// token).
    pub validation_index: u64,

    /// Diagnostic log, if construction failed.
    pub log: Option<Blob>,

    /// Code identifying the cached asset type.
    pub type_code: u64,

    /// The entry's 64-bit key.
    pub key: AssetKey,

    /// How many times this key's entry has been (re)constructed.
    pub initialization_count: u32,
}

/// A stable 64-bit code for an asset type, derived from its type name.
pub fn type_code_of<T: 'static>() -> u64 {
    xxhash_rust::xxh3::xxh3_64(std::any::type_name::<T>().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes_differ_by_type() {
        assert_ne!(type_code_of::<u32>(), type_code_of::<String>());
    }

    #[test]
    fn type_code_stable() {
        assert_eq!(type_code_of::<u32>(), type_code_of::<u32>());
    }
}
