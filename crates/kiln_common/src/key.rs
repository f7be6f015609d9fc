//! Canonical asset keys built from initializer tuples.
//!
//! Every cacheable asset is identified by the tuple of initializer strings
//! passed to its constructor (e.g. `("skin.tech", "lighting=forward")`). The
//! tuple is serialized into a canonical byte form (length-prefixed parts, so
//! `("ab", "c")` and `("a", "bc")` never collide) and hashed to a 64-bit key
//! used by the cache tables.

use std::fmt;

/// A 64-bit key addressing one logical asset in a cache table.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetKey(u64);

impl AssetKey {
    /// Wraps a raw 64-bit key value.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw 64-bit key value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetKey({:016x})", self.0)
    }
}

/// An initializer tuple in resolved form: the canonical 64-bit key plus the
/// human-readable initializer string retained for diagnostics.
#[derive(Clone, PartialEq, Eq)]
pub struct AssetInit {
    key: AssetKey,
    initializer: String,
}

impl AssetInit {
    /// Builds an `AssetInit` from the parts of an initializer tuple.
    ///
    /// The display form joins the parts with `:`, matching how the engine
    /// spells compound initializers (`"skin.tech:lighting=forward"`).
    pub fn from_parts(parts: &[&str]) -> Self {
        let mut canonical = Vec::new();
        for part in parts {
            canonical.extend_from_slice(&(part.len() as u64).to_le_bytes());
            canonical.extend_from_slice(part.as_bytes());
        }
        Self {
            key: AssetKey::from_raw(xxhash_rust::xxh3::xxh3_64(&canonical)),
            initializer: parts.join(":"),
        }
    }

    /// Builds an `AssetInit` from a single initializer string.
    pub fn new(initializer: &str) -> Self {
        Self::from_parts(&[initializer])
    }

    /// The canonical 64-bit key.
    pub fn key(&self) -> AssetKey {
        self.key
    }

    /// The human-readable initializer string (diagnostics only).
    pub fn initializer(&self) -> &str {
        &self.initializer
    }
}

impl fmt::Display for AssetInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.initializer)
    }
}

impl fmt::Debug for AssetInit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetInit({:?} -> {})", self.initializer, self.key)
    }
}
